use axum::Router;

/// Routes that `placementd` mounts next to `/health` and `/version`.
///
/// The allocation ledger is the only implementor. Its router is already
/// nested under `/allocation/v1` and carries the service as state, so the
/// binary only merges it.
pub trait Module: Send + Sync {
    /// Short name logged when the router is mounted, e.g. `"allocation"`.
    fn name(&self) -> &str;

    /// Prefixed, state-bound router.
    fn routes(&self) -> Router;
}
