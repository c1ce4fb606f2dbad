//! Identifier types for recipe storage and lookup.

use std::fmt;
use std::sync::Arc;

/// Canonical key naming an injectable construction recipe.
///
/// Identifiers can be produced from a type ([`Identifier::of`]) or from a
/// plain string ([`Identifier::named`]). Both pass through the same
/// canonicalization, so registering by type and looking up by the type's
/// fully-qualified name reach the same recipe.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::Identifier;
///
/// struct Database;
///
/// let by_type = Identifier::of::<Database>();
/// let by_name = Identifier::named(std::any::type_name::<Database>());
/// assert_eq!(by_type, by_name);
///
/// // Surrounding whitespace and a leading path separator are not significant
/// assert_eq!(Identifier::named("  ::app::Cache "), Identifier::named("app::Cache"));
/// assert_eq!(
///     Identifier::named("alloc::vec::Vec< u8 >"),
///     Identifier::of::<Vec<u8>>(),
/// );
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Arc<str>);

impl Identifier {
    /// Identifier for the type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::named(std::any::type_name::<T>())
    }

    /// Identifier for an arbitrary name.
    pub fn named(name: impl AsRef<str>) -> Self {
        Identifier(Arc::from(canonicalize(name.as_ref())))
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", &self.0)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::named(name)
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::named(name)
    }
}

impl From<&Identifier> for Identifier {
    fn from(id: &Identifier) -> Self {
        id.clone()
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of type `T`; same as [`Identifier::of`].
#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> Identifier {
    Identifier::of::<T>()
}

/// Maps a type path to its canonical spelling.
///
/// Whitespace runs collapse to a single space, vanish next to opening and
/// closing brackets, and commas are always followed by exactly one space,
/// which is the spelling `std::any::type_name` produces.
pub fn canonicalize(raw: &str) -> String {
    let mut trimmed = raw.trim();
    while let Some(rest) = trimmed.strip_prefix("::") {
        trimmed = rest.trim_start();
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut pending_space = false;
    let mut prev: Option<char> = None;

    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }

        let closing = matches!(ch, '>' | ')' | ']' | ',');
        if prev == Some(',') {
            if !closing {
                out.push(' ');
            }
        } else if pending_space {
            let opening = matches!(prev, Some('<' | '(' | '[' | '&'));
            if !opening && !closing {
                out.push(' ');
            }
        }

        out.push(ch);
        prev = Some(ch);
        pending_space = false;
    }

    out
}
