//! Workspace root placeholder. All functionality lives in `crates/*`.
