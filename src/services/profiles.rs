/// Profile lookup supplied by the (external) profile subsystem. Used only to
/// decorate conversation previews; a missing avatar degrades the preview and
/// never fails the request.
#[async_trait::async_trait]
pub trait ProfileDirectory: Send + Sync + std::fmt::Debug {
    async fn avatar_for(&self, user: &str) -> Option<String>;
}

/// Directory that knows nobody. Default when no profile backend is wired in.
#[derive(Debug, Default)]
pub struct NoProfileDirectory;

#[async_trait::async_trait]
impl ProfileDirectory for NoProfileDirectory {
    async fn avatar_for(&self, _user: &str) -> Option<String> {
        None
    }
}
