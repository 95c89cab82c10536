//! Attribute views over entries.
//!
//! The basic view is always present; DOS, owner, POSIX and user-defined
//! views are enabled per filesystem at construction time. Dynamic access
//! uses `"view:name"` strings with `basic` implied when no view prefix is
//! given; reads additionally accept `*` and comma-separated name lists.

mod basic;
mod dos;
mod owner;
mod posix;
mod user;

pub use basic::{BasicAttributes, BasicView};
pub use dos::{DosAttributes, DosView};
pub use owner::OwnerView;
pub use posix::{PosixAttributes, PosixView};
pub use user::UserView;

use indexmap::IndexMap;

use crate::config::ViewSet;
use crate::node::EntryState;
use crate::types::{AttrValue, DosFlags, Permissions, Principal};
use crate::{VfsError, VfsResult};

/// Per-entry attribute state, guarded by the entry's lock.
pub(crate) struct AttrState {
    pub dos: DosFlags,
    pub owner: Principal,
    pub group: Principal,
    pub perms: Permissions,
    pub user: hashbrown::HashMap<String, Box<[u8]>>,
}

impl AttrState {
    pub(crate) fn new(perms: Permissions) -> Self {
        Self {
            dos: DosFlags::empty(),
            owner: Principal::named("user"),
            group: Principal::named("group"),
            perms,
            user: hashbrown::HashMap::new(),
        }
    }
}

const TIME_NAMES: &[&str] = &["lastModifiedTime", "lastAccessTime", "creationTime"];

/// Splits an attribute spec into view and names. No colon means the basic
/// view; an empty view or name part is rejected.
pub(crate) fn parse_spec(spec: &str) -> VfsResult<(&str, &str)> {
    let (view, names) = match spec.split_once(':') {
        Some((view, names)) => (view, names),
        None => ("basic", spec),
    };
    if view.is_empty() || names.is_empty() {
        return Err(VfsError::InvalidArgument(format!(
            "malformed attribute spec: {spec:?}"
        )));
    }
    Ok((view, names))
}

/// Checks that `view` names a view this filesystem was built with.
pub(crate) fn check_view(views: ViewSet, view: &str) -> VfsResult<()> {
    let supported = match view {
        "basic" => true,
        "dos" => views.contains(ViewSet::DOS),
        "owner" => views.contains(ViewSet::OWNER),
        "posix" => views.contains(ViewSet::POSIX),
        "user" => views.contains(ViewSet::USER),
        _ => false,
    };
    if supported {
        Ok(())
    } else {
        Err(VfsError::NotSupported(format!("view not supported: {view}")))
    }
}

fn read_named(state: &EntryState, view: &str, name: &str) -> VfsResult<AttrValue> {
    let value = match view {
        "basic" => basic::read(state, name),
        "dos" => dos::read(state, name).or_else(|| basic::read(state, name)),
        "owner" => owner::read(state, name),
        "posix" => posix::read(state, name)
            .or_else(|| owner::read(state, name))
            .or_else(|| basic::read(state, name)),
        "user" => user::read(state, name),
        _ => None,
    };
    value.ok_or_else(|| {
        VfsError::InvalidArgument(format!("no such attribute: {view}:{name}"))
    })
}

fn all_names(state: &EntryState, view: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    match view {
        "basic" => names.extend(basic::NAMES.iter().map(|s| s.to_string())),
        "dos" => {
            names.extend(dos::NAMES.iter().map(|s| s.to_string()));
            names.extend(basic::NAMES.iter().map(|s| s.to_string()));
        }
        "owner" => names.push("owner".to_owned()),
        "posix" => {
            names.extend(posix::NAMES.iter().map(|s| s.to_string()));
            names.push("owner".to_owned());
            names.extend(basic::NAMES.iter().map(|s| s.to_string()));
        }
        "user" => names.extend(state.attrs.user.keys().cloned()),
        _ => {}
    }
    names
}

/// Reads attributes per a spec like `"size"`, `"posix:permissions,group"`
/// or `"dos:*"`.
pub(crate) fn read_attributes(
    state: &EntryState,
    views: ViewSet,
    spec: &str,
) -> VfsResult<IndexMap<String, AttrValue>> {
    let (view, names) = parse_spec(spec)?;
    check_view(views, view)?;
    let mut out = IndexMap::new();
    if names == "*" {
        for name in all_names(state, view) {
            let value = read_named(state, view, &name)?;
            out.insert(name, value);
        }
    } else {
        for name in names.split(',') {
            let value = read_named(state, view, name)?;
            out.insert(name.to_owned(), value);
        }
    }
    Ok(out)
}

/// Reads a single attribute; the spec must name exactly one.
pub(crate) fn read_attribute(
    state: &EntryState,
    views: ViewSet,
    spec: &str,
) -> VfsResult<AttrValue> {
    let (view, name) = parse_spec(spec)?;
    check_view(views, view)?;
    if name == "*" || name.contains(',') {
        return Err(VfsError::InvalidArgument(format!(
            "a single attribute name is required: {spec:?}"
        )));
    }
    read_named(state, view, name)
}

/// Sets a single attribute by name.
///
/// With `initial` set the call is validating creation-time attributes,
/// where the three time attributes are rejected outright.
pub(crate) fn set_attribute(
    state: &mut EntryState,
    views: ViewSet,
    spec: &str,
    value: &AttrValue,
    initial: bool,
) -> VfsResult<()> {
    let (view, name) = parse_spec(spec)?;
    check_view(views, view)?;
    if name == "*" || name.contains(',') {
        return Err(VfsError::InvalidArgument(format!(
            "a single attribute name is required: {spec:?}"
        )));
    }
    if initial && TIME_NAMES.contains(&name) {
        return Err(VfsError::NotSupported(format!(
            "unsupported initial attribute: {name}"
        )));
    }
    match view {
        "basic" => basic::set(name, spec),
        "dos" => dos::set(state, name, value, spec),
        "owner" => owner::set(state, name, value, spec),
        "posix" => posix::set(state, name, value, spec),
        "user" => user::set(state, name, value),
        _ => Err(VfsError::NotSupported(format!("view not supported: {view}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{DirChildren, NodeKind};
    use crate::node::EntryState;
    use crate::types::EntryType;

    fn dir_state() -> EntryState {
        EntryState {
            name: "d".to_owned(),
            times: crate::node::Timestamps::now(),
            attrs: AttrState::new(Permissions::default()),
            kind: NodeKind::Directory(DirChildren::new()),
        }
    }

    #[test]
    fn parse_spec_defaults_to_basic() {
        assert_eq!(parse_spec("size").unwrap(), ("basic", "size"));
        assert_eq!(parse_spec("posix:group").unwrap(), ("posix", "group"));
        assert!(parse_spec(":size").is_err());
        assert!(parse_spec("posix:").is_err());
    }

    #[test]
    fn basic_star_reads_all() {
        let state = dir_state();
        let map = read_attributes(&state, ViewSet::empty(), "basic:*").unwrap();
        assert_eq!(map["isDirectory"], AttrValue::Bool(true));
        assert_eq!(map["isRegularFile"], AttrValue::Bool(false));
        assert_eq!(map["size"], AttrValue::Size(0));
        assert!(map.contains_key("creationTime"));
    }

    #[test]
    fn unconfigured_view_is_rejected() {
        let state = dir_state();
        let err = read_attributes(&state, ViewSet::empty(), "dos:hidden");
        assert!(matches!(err, Err(VfsError::NotSupported(_))));
    }

    #[test]
    fn initial_time_attributes_are_rejected() {
        let mut state = dir_state();
        let err = set_attribute(
            &mut state,
            ViewSet::empty(),
            "lastModifiedTime",
            &AttrValue::Time(std::time::SystemTime::now()),
            true,
        );
        assert!(matches!(err, Err(VfsError::NotSupported(_))));
    }

    #[test]
    fn posix_set_and_read_permissions() {
        let mut state = dir_state();
        let views = ViewSet::POSIX | ViewSet::OWNER;
        set_attribute(
            &mut state,
            views,
            "posix:permissions",
            &AttrValue::Permissions(Permissions::from_mode(0o700)),
            false,
        )
        .unwrap();
        let value = read_attribute(&state, views, "posix:permissions").unwrap();
        assert_eq!(value, AttrValue::Permissions(Permissions::from_mode(0o700)));
        assert_eq!(state.entry_type(), EntryType::Directory);
    }
}
