use serde_json::Value;

use crate::runtime::RuntimeCommand;
use crate::types::Direction;

/// Parses one JSON command line such as `{"type":"press","dir":"left"}`.
/// Anything malformed, or a press/release without a cardinal direction,
/// yields `None`.
pub fn parse_command(raw: &str) -> Option<RuntimeCommand> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "press" | "release" => {
            let dir = Direction::parse_move(object.get("dir")?.as_str()?)?;
            if dir.is_none() {
                return None;
            }
            if message_type == "press" {
                Some(RuntimeCommand::Press(dir))
            } else {
                Some(RuntimeCommand::Release(dir))
            }
        }
        "reset" => Some(RuntimeCommand::Reset),
        "next_level" => Some(RuntimeCommand::NextLevel),
        _ => None,
    }
}
