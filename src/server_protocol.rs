use serde_json::{Map, Value};

use crate::types::PlayerIntent;

#[derive(Debug)]
pub enum ParsedClientMessage {
    Input {
        intent: PlayerIntent,
    },
    Restart {
        seed: Option<i64>,
        maze_size: Option<i64>,
    },
    Ping {
        t: f64,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "input" => {
            let yaw = match object.get("yaw") {
                None => 0.0,
                Some(value) => value.as_f64()?,
            };
            if !yaw.is_finite() {
                return None;
            }
            let intent = PlayerIntent {
                forward: parse_flag(object, "forward")?,
                back: parse_flag(object, "back")?,
                left: parse_flag(object, "left")?,
                right: parse_flag(object, "right")?,
                run: parse_flag(object, "run")?,
                interact: parse_flag(object, "interact")?,
                throw: parse_flag(object, "throw")?,
                yaw: yaw as f32,
            };
            Some(ParsedClientMessage::Input { intent })
        }
        "restart" => {
            let seed = parse_optional_i64(object.get("seed"))?;
            let maze_size = parse_optional_i64(object.get("mazeSize"))?;
            Some(ParsedClientMessage::Restart { seed, maze_size })
        }
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

/// Missing flags read as released; a non-boolean rejects the message.
fn parse_flag(object: &Map<String, Value>, key: &str) -> Option<bool> {
    match object.get(key) {
        None => Some(false),
        Some(value) => value.as_bool(),
    }
}

fn parse_optional_i64(value: Option<&Value>) -> Option<Option<i64>> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    let Some(value) = value else {
        return Some(None);
    };
    if let Some(number) = value.as_i64() {
        return Some(Some(number));
    }
    if let Some(number) = value.as_u64() {
        return i64::try_from(number).ok().map(Some);
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() {
            let floored = number.floor();
            if floored.abs() > MAX_SAFE_INTEGER_F64 {
                return None;
            }
            return Some(Some(floored as i64));
        }
    }
    None
}
