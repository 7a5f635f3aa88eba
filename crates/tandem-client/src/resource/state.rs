use serde::Serialize;
use tandem_common::RpcError;

/// Event names delivered on the generic `on` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceEvent {
    LoadingStart,
    LoadingEnd,
    Loaded,
    Data,
    Error,
}

impl ResourceEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceEvent::LoadingStart => "loading-start",
            ResourceEvent::LoadingEnd => "loading-end",
            ResourceEvent::Loaded => "loaded",
            ResourceEvent::Data => "data",
            ResourceEvent::Error => "error",
        }
    }
}

impl std::fmt::Display for ResourceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a resource.
///
/// `loading` and `loaded` are never both true. `index` counts every fetch
/// attempt and never goes back, so a consumer can tell which generation a
/// snapshot belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub data: Option<T>,
    pub error: Option<RpcError>,
    pub index: u64,
    pub loading: bool,
    pub loaded: bool,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            index: 0,
            loading: false,
            loaded: false,
        }
    }
}
