//! RPC method names.

use std::fmt;
use std::sync::Arc;

/// A fully qualified RPC method name, `package.Service/Method`.
///
/// Never checked against a registry: any non-empty name is dispatchable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodName(Arc<str>);

impl MethodName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Extract the method name from an inbound request path (`/svc/Method`).
    ///
    /// Returns `None` when nothing is left after the leading slash.
    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.strip_prefix('/').unwrap_or(path);
        if name.is_empty() {
            None
        } else {
            Some(Self::new(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the last `/`, if any.
    pub fn service(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(service, _)| service)
    }

    /// The part after the last `/` (the whole name when there is no `/`).
    pub fn method(&self) -> &str {
        self.0.rsplit_once('/').map_or(&self.0, |(_, method)| method)
    }
}

impl fmt::Display for MethodName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MethodName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_grpc_paths() {
        let name = MethodName::from_path("/helloworld.Greeter/SayHello").unwrap();
        assert_eq!(name.as_str(), "helloworld.Greeter/SayHello");
        assert_eq!(name.service(), Some("helloworld.Greeter"));
        assert_eq!(name.method(), "SayHello");
    }

    #[test]
    fn accepts_unconventional_names() {
        let name = MethodName::from_path("/just-a-name").unwrap();
        assert_eq!(name.service(), None);
        assert_eq!(name.method(), "just-a-name");

        let nested = MethodName::from_path("/a/b/c").unwrap();
        assert_eq!(nested.service(), Some("a/b"));
        assert_eq!(nested.method(), "c");
    }

    #[test]
    fn rejects_empty_paths() {
        assert_eq!(MethodName::from_path("/"), None);
        assert_eq!(MethodName::from_path(""), None);
    }
}
