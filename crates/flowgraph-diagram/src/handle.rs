use serde::{Deserialize, Serialize};

use crate::ids::{HandleId, NodeId};

/// Direction of a handle on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
  Input,
  Output,
}

/// A named input or output port on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handle {
  pub id: HandleId,
  pub node_id: NodeId,
  pub name: String,
  pub direction: Direction,
}

/// A handle reference parsed from its canonical string form
/// `<NodeID>:<HandleName>:<Direction>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHandle {
  pub node_id: NodeId,
  pub handle_name: String,
  pub direction: Direction,
}

/// Parse a handle reference string into its components.
///
/// Returns `None` if the string does not have exactly three `:`-separated
/// parts or the direction segment is not `input`/`output`.
pub fn parse_handle_ref(raw: &str) -> Option<ParsedHandle> {
  let mut parts = raw.splitn(3, ':');
  let node_id = parts.next()?;
  let handle_name = parts.next()?;
  let direction_raw = parts.next()?;
  if parts.next().is_some() {
    return None;
  }
  if node_id.is_empty() || handle_name.is_empty() {
    return None;
  }
  let direction = match direction_raw {
    "input" => Direction::Input,
    "output" => Direction::Output,
    _ => return None,
  };
  Some(ParsedHandle {
    node_id: NodeId::from(node_id),
    handle_name: handle_name.to_string(),
    direction,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_well_formed_reference() {
    let parsed = parse_handle_ref("nodeA:default:output").unwrap();
    assert_eq!(parsed.node_id, NodeId::from("nodeA"));
    assert_eq!(parsed.handle_name, "default");
    assert_eq!(parsed.direction, Direction::Output);
  }

  #[test]
  fn rejects_bad_direction() {
    assert!(parse_handle_ref("nodeA:default:sideways").is_none());
  }

  #[test]
  fn rejects_missing_segments() {
    assert!(parse_handle_ref("nodeA:default").is_none());
    assert!(parse_handle_ref("nodeA").is_none());
  }

  #[test]
  fn allows_colons_inside_handle_name_via_splitn() {
    // splitn(3, ':') means a handle name itself cannot contain ':', but the
    // direction segment is always the last one.
    let parsed = parse_handle_ref("n:h:output").unwrap();
    assert_eq!(parsed.direction, Direction::Output);
  }
}
