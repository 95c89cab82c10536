//! Path values handed to the filesystem core.
//!
//! A [`VfsPath`] is a root key plus a sequence of name elements. Parsing of
//! raw strings happens in the filesystem façade, which knows the configured
//! roots and separator; this module only carries the parsed form and the
//! lexical operations on it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use smallvec::SmallVec;

pub(crate) type Elements = SmallVec<[String; 4]>;

/// A parsed path: an optional root key and a sequence of elements.
///
/// Equality and hashing are lexical (root and elements, separator ignored).
/// Identity of the entries two paths refer to is a question for
/// [`MemoryFileSystem::real_path`](crate::MemoryFileSystem::real_path).
#[derive(Clone)]
pub struct VfsPath {
    root: Option<String>,
    elements: Elements,
    separator: Arc<str>,
}

impl VfsPath {
    pub(crate) fn absolute(
        root: impl Into<String>,
        elements: impl IntoIterator<Item = String>,
        separator: Arc<str>,
    ) -> Self {
        Self {
            root: Some(root.into()),
            elements: elements.into_iter().collect(),
            separator,
        }
    }

    pub(crate) fn relative(
        elements: impl IntoIterator<Item = String>,
        separator: Arc<str>,
    ) -> Self {
        Self {
            root: None,
            elements: elements.into_iter().collect(),
            separator,
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.root.is_some()
    }

    /// The root key, for absolute paths.
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// The final element, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.elements.last().map(String::as_str)
    }

    /// The path without its final element. `None` for a bare root or an
    /// empty relative path.
    pub fn parent(&self) -> Option<VfsPath> {
        if self.elements.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.elements.pop();
        Some(parent)
    }

    /// This path extended by one already-parsed element.
    pub(crate) fn child(&self, name: &str) -> VfsPath {
        let mut child = self.clone();
        child.elements.push(name.to_owned());
        child
    }

    /// Joins `other` onto `self`; an absolute `other` replaces `self`.
    pub fn join(&self, other: &VfsPath) -> VfsPath {
        if other.is_absolute() {
            return other.clone();
        }
        let mut joined = self.clone();
        joined.elements.extend(other.elements.iter().cloned());
        joined
    }

    /// Lexically resolves `.` and `..` elements.
    ///
    /// On absolute paths `..` at the root stays at the root. On relative
    /// paths leading `..` elements are preserved.
    pub fn normalized(&self) -> VfsPath {
        let mut out: Elements = SmallVec::new();
        for element in &self.elements {
            match element.as_str() {
                "" | "." => {}
                ".." => {
                    if out.last().is_some_and(|last| last != "..") {
                        out.pop();
                    } else if self.root.is_none() {
                        out.push("..".to_owned());
                    }
                }
                _ => out.push(element.clone()),
            }
        }
        Self {
            root: self.root.clone(),
            elements: out,
            separator: self.separator.clone(),
        }
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(root) = &self.root {
            f.write_str(root)?;
        }
        let mut first = true;
        for element in &self.elements {
            if !first {
                f.write_str(&self.separator)?;
            }
            first = false;
            f.write_str(element)?;
        }
        Ok(())
    }
}

impl fmt::Debug for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VfsPath({self})")
    }
}

impl PartialEq for VfsPath {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.elements == other.elements
    }
}

impl Eq for VfsPath {}

impl Hash for VfsPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.root.hash(state);
        self.elements.hash(state);
    }
}
