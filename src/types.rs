/// Catalog identifier of a target star (KIC id)
pub type TargetId = u64;
