//! Locally generated identifiers.
//!
//! Ids look like `<prefix>-<epoch ms>-<8 hex chars>`. The random suffix comes
//! from a v4 UUID so two ids minted in the same millisecond do not collide.

use uuid::Uuid;

pub const NOTE_ID_PREFIX: &str = "note";
pub const LABEL_ID_PREFIX: &str = "label";
pub const MUTATION_ID_PREFIX: &str = "mutation";

/// Mints a new id with the given prefix at `now_ms`.
pub fn new_id(prefix: &str, now_ms: i64) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{now_ms}-{}", &random[..8])
}
