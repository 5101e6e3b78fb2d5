//! Two-level route table: path → {action → handler}.
//!
//! # Responsibilities
//! - Register handlers under (path, action) keys
//! - Track which paths accept requests without an action
//! - Track the HTTP methods each path is mounted on
//! - Resolve the handler for a matched path and body action
//!
//! # Design Decisions
//! - Registration needs `&mut self`; the server only ever sees
//!   `Arc<RouteTable>`, so the table is frozen once traffic starts
//! - Last registration for a key wins
//! - "Path has no no-action entry" and "action missing" are reported as
//!   distinct errors even though clients see the same errCode

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::envelope::NO_ACTION;
use crate::error::{RegistrationError, RouteNotFound};
use crate::routing::handler::Handler;

/// HTTP verbs a path is served under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Methods {
    Post,
    Get,
    Both,
}

impl Methods {
    pub fn allows_post(self) -> bool {
        matches!(self, Methods::Post | Methods::Both)
    }

    pub fn allows_get(self) -> bool {
        matches!(self, Methods::Get | Methods::Both)
    }

    /// Smallest method set covering both `self` and `other`.
    pub fn union(self, other: Methods) -> Methods {
        if self == other {
            self
        } else {
            Methods::Both
        }
    }
}

impl FromStr for Methods {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POST" => Ok(Methods::Post),
            "GET" => Ok(Methods::Get),
            "BOTH" | "ALL" => Ok(Methods::Both),
            _ => Err(RegistrationError::UnknownMethods(s.to_string())),
        }
    }
}

impl fmt::Display for Methods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Methods::Post => write!(f, "POST"),
            Methods::Get => write!(f, "GET"),
            Methods::Both => write!(f, "BOTH"),
        }
    }
}

/// A (path, action) pair indexing the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub path: String,
    pub action: String,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path, self.action)
    }
}

/// Handler registry consulted by the dispatcher.
#[derive(Default)]
pub struct RouteTable {
    handlers: HashMap<String, HashMap<String, Arc<dyn Handler>>>,
    no_action_paths: HashSet<String>,
    mounts: BTreeMap<String, Methods>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for (`path`, `action`), served under `methods`.
    ///
    /// `path` gains a leading `/` when missing. `action` equal to
    /// [`NO_ACTION`] marks the path as callable without an action field.
    pub fn register<H: Handler>(
        &mut self,
        path: &str,
        action: &str,
        methods: Methods,
        handler: H,
    ) -> Result<(), RegistrationError> {
        self.register_arc(path, action, methods, Arc::new(handler))
    }

    /// Same as [`register`](Self::register) for an already shared handler.
    pub fn register_arc(
        &mut self,
        path: &str,
        action: &str,
        methods: Methods,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RegistrationError> {
        let path = normalize_path(path)?;
        if action.is_empty() {
            return Err(RegistrationError::EmptyAction);
        }
        if !self.mounts.contains_key(&path) {
            if let Some(existing) = self.mounts.keys().find(|m| templates_conflict(m, &path)) {
                return Err(RegistrationError::ConflictingPath {
                    path,
                    existing: existing.clone(),
                });
            }
        }

        if action == NO_ACTION {
            self.no_action_paths.insert(path.clone());
        }

        let replaced = self
            .handlers
            .entry(path.clone())
            .or_default()
            .insert(action.to_string(), handler)
            .is_some();

        self.mounts
            .entry(path.clone())
            .and_modify(|m| *m = m.union(methods))
            .or_insert(methods);

        tracing::debug!(path = %path, action = %action, methods = %methods, replaced, "Route registered");
        Ok(())
    }

    /// Resolve the handler for a matched path and the body's action, if any.
    pub fn lookup(&self, path: &str, action: Option<&str>) -> Result<&dyn Handler, RouteNotFound> {
        let action = action.unwrap_or(NO_ACTION);

        if action == NO_ACTION && !self.no_action_paths.contains(path) {
            return Err(RouteNotFound::NoActionNotAllowed {
                path: path.to_string(),
            });
        }

        self.handlers
            .get(path)
            .and_then(|actions| actions.get(action))
            .map(|h| &**h)
            .ok_or_else(|| RouteNotFound::ActionNotSupported {
                path: path.to_string(),
                action: action.to_string(),
            })
    }

    /// Whether `path` was registered with the no-action sentinel.
    pub fn accepts_no_action(&self, path: &str) -> bool {
        self.no_action_paths.contains(path)
    }

    /// Paths to mount on the HTTP router with their method sets, sorted by path.
    pub fn mounts(&self) -> impl Iterator<Item = (&str, Methods)> {
        self.mounts.iter().map(|(p, m)| (p.as_str(), *m))
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<RouteKey> {
        let mut keys: Vec<RouteKey> = self
            .handlers
            .iter()
            .flat_map(|(path, actions)| {
                actions.keys().map(move |action| RouteKey {
                    path: path.clone(),
                    action: action.clone(),
                })
            })
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.handlers.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("keys", &self.keys())
            .field("no_action_paths", &self.no_action_paths)
            .field("mounts", &self.mounts)
            .finish()
    }
}

fn normalize_path(path: &str) -> Result<String, RegistrationError> {
    if path.is_empty() {
        return Err(RegistrationError::EmptyPath);
    }
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    check_template(&path)?;
    Ok(path)
}

/// A parameter segment (`{name}` or `{*name}`), if `segment` is one.
fn param(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

/// Reject templates the HTTP router cannot mount.
fn check_template(path: &str) -> Result<(), RegistrationError> {
    let invalid = |reason: &str| RegistrationError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let segments: Vec<&str> = path[1..].split('/').collect();
    let last = segments.len() - 1;
    let mut names = HashSet::new();

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            // "/" and a trailing slash are fine; "//" is not.
            if i == last {
                continue;
            }
            return Err(invalid("empty segment"));
        }
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err(invalid("use {name} or {*name} for parameters"));
        }
        match param(segment) {
            Some(inner) => {
                let (name, catch_all) = match inner.strip_prefix('*') {
                    Some(name) => (name, true),
                    None => (inner, false),
                };
                if name.is_empty() || name.contains(['{', '}', '*']) {
                    return Err(invalid("malformed parameter"));
                }
                if catch_all && i != last {
                    return Err(invalid("catch-all parameter must be the last segment"));
                }
                if !names.insert(name) {
                    return Err(invalid("duplicate parameter name"));
                }
            }
            None if segment.contains(['{', '}']) => {
                return Err(invalid("parameter must span the whole segment"));
            }
            None => {}
        }
    }
    Ok(())
}

/// Whether two distinct templates would capture the same segment under
/// different parameters.
fn templates_conflict(a: &str, b: &str) -> bool {
    for (x, y) in a.split('/').zip(b.split('/')) {
        if x == y {
            continue;
        }
        return param(x).is_some() && param(y).is_some();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::RequestContext;
    use crate::routing::handler::handler_fn;
    use serde_json::{json, Map};

    fn tagged(tag: &'static str) -> impl Handler {
        handler_fn(move |ctx: &mut RequestContext| ctx.set_data(json!(tag)))
    }

    async fn run(table: &RouteTable, path: &str, action: Option<&str>) -> Option<serde_json::Value> {
        let handler = table.lookup(path, action).ok()?;
        let mut ctx = RequestContext::new(path, Map::new(), 0);
        handler.call(&mut ctx).await;
        ctx.data().cloned()
    }

    #[test]
    fn test_methods_parse() {
        assert_eq!("POST".parse::<Methods>().unwrap(), Methods::Post);
        assert_eq!("get".parse::<Methods>().unwrap(), Methods::Get);
        assert_eq!("ALL".parse::<Methods>().unwrap(), Methods::Both);
        assert_eq!("both".parse::<Methods>().unwrap(), Methods::Both);
        assert_eq!(
            "PUT".parse::<Methods>(),
            Err(RegistrationError::UnknownMethods("PUT".into()))
        );
    }

    #[test]
    fn test_methods_union() {
        assert_eq!(Methods::Post.union(Methods::Post), Methods::Post);
        assert_eq!(Methods::Post.union(Methods::Get), Methods::Both);
        assert_eq!(Methods::Both.union(Methods::Get), Methods::Both);
        assert!(Methods::Both.allows_get() && Methods::Both.allows_post());
        assert!(!Methods::Get.allows_post());
    }

    #[test]
    fn test_register_rejects_empty_path_and_action() {
        let mut table = RouteTable::new();
        assert_eq!(
            table.register("", "-", Methods::Post, tagged("x")),
            Err(RegistrationError::EmptyPath)
        );
        assert_eq!(
            table.register("/a", "", Methods::Post, tagged("x")),
            Err(RegistrationError::EmptyAction)
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_register_rejects_unmountable_paths() {
        let mut table = RouteTable::new();
        for path in [
            "api/:id",
            "/files/*rest",
            "/api//user",
            "/{*rest}/tail",
            "/item-{id}",
            "/{}",
            "/{a}/{a}",
        ] {
            assert!(
                matches!(
                    table.register(path, NO_ACTION, Methods::Post, tagged("x")),
                    Err(RegistrationError::InvalidPath { .. })
                ),
                "{path} should be rejected"
            );
        }
        assert!(table.is_empty());

        for path in ["/", "/api/", "/api/item/{id}", "/files/{*rest}"] {
            table.register(path, NO_ACTION, Methods::Post, tagged("x")).unwrap();
        }
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_register_rejects_conflicting_templates() {
        let mut table = RouteTable::new();
        table.register("/api/{a}", NO_ACTION, Methods::Post, tagged("a")).unwrap();

        assert_eq!(
            table.register("/api/{b}", NO_ACTION, Methods::Post, tagged("b")),
            Err(RegistrationError::ConflictingPath {
                path: "/api/{b}".into(),
                existing: "/api/{a}".into(),
            })
        );
        assert!(matches!(
            table.register("/api/{*rest}", NO_ACTION, Methods::Post, tagged("c")),
            Err(RegistrationError::ConflictingPath { .. })
        ));

        // Same template again, a static sibling and a longer path are all mountable.
        table.register("/api/{a}", "mod", Methods::Get, tagged("a2")).unwrap();
        table.register("/api/static", NO_ACTION, Methods::Post, tagged("s")).unwrap();
        table.register("/api/{a}/detail", NO_ACTION, Methods::Post, tagged("d")).unwrap();
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_register_adds_leading_slash() {
        let mut table = RouteTable::new();
        table.register("api/getuserinfo", NO_ACTION, Methods::Post, tagged("a")).unwrap();

        assert!(table.accepts_no_action("/api/getuserinfo"));
        assert!(table.lookup("/api/getuserinfo", None).is_ok());
        assert_eq!(
            table.keys(),
            vec![RouteKey { path: "/api/getuserinfo".into(), action: "-".into() }]
        );
    }

    #[test]
    fn test_action_path_rejects_missing_action() {
        let mut table = RouteTable::new();
        table.register("/api/userinfo", "mod", Methods::Post, tagged("mod")).unwrap();
        table.register("/api/userinfo", "del", Methods::Post, tagged("del")).unwrap();

        assert_eq!(
            table.lookup("/api/userinfo", None).err(),
            Some(RouteNotFound::NoActionNotAllowed { path: "/api/userinfo".into() })
        );
    }

    #[test]
    fn test_explicit_sentinel_action_behaves_like_missing() {
        let mut table = RouteTable::new();
        table.register("/api/userinfo", "mod", Methods::Post, tagged("mod")).unwrap();

        assert_eq!(
            table.lookup("/api/userinfo", Some("-")).err(),
            Some(RouteNotFound::NoActionNotAllowed { path: "/api/userinfo".into() })
        );
    }

    #[test]
    fn test_no_action_path_rejects_unknown_action() {
        let mut table = RouteTable::new();
        table.register("/api/getuserinfo", NO_ACTION, Methods::Post, tagged("a")).unwrap();

        assert_eq!(
            table.lookup("/api/getuserinfo", Some("mod")).err(),
            Some(RouteNotFound::ActionNotSupported {
                path: "/api/getuserinfo".into(),
                action: "mod".into(),
            })
        );
    }

    #[test]
    fn test_unknown_path() {
        let table = RouteTable::new();
        assert!(matches!(
            table.lookup("/nowhere", None),
            Err(RouteNotFound::NoActionNotAllowed { .. })
        ));
        assert!(matches!(
            table.lookup("/nowhere", Some("x")),
            Err(RouteNotFound::ActionNotSupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_mixed_path_routes_by_action() {
        let mut table = RouteTable::new();
        table.register("/api/user", NO_ACTION, Methods::Post, tagged("default")).unwrap();
        table.register("/api/user", "mod", Methods::Get, tagged("mod")).unwrap();

        assert_eq!(run(&table, "/api/user", None).await, Some(json!("default")));
        assert_eq!(run(&table, "/api/user", Some("mod")).await, Some(json!("mod")));
        assert_eq!(run(&table, "/api/user", Some("del")).await, None);

        let mounts: Vec<_> = table.mounts().collect();
        assert_eq!(mounts, vec![("/api/user", Methods::Both)]);
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let mut table = RouteTable::new();
        table.register("/api/userinfo", "mod", Methods::Post, tagged("first")).unwrap();
        table.register("/api/userinfo", "mod", Methods::Post, tagged("second")).unwrap();

        assert_eq!(run(&table, "/api/userinfo", Some("mod")).await, Some(json!("second")));
        assert_eq!(table.len(), 1);
    }
}
