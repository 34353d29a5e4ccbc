//! Raw task definitions as they appear in the YAML document.
//!
//! Several fields accept a shorthand (a bare string instead of a block, a
//! single string instead of a list); the untagged enums here accept both
//! spellings and the normalizer expands them.
use serde::Deserialize;

/// A single item or a list of items (strings by default).
///
/// `Many` is tried first: a hook block would otherwise also accept a
/// sequence through serde's positional struct form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T = String> {
    /// A list.
    Many(Vec<T>),
    /// A lone item standing for a one-element list.
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    /// Borrow the contained items as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(item) => std::slice::from_ref(item),
            Self::Many(items) => items,
        }
    }
}

impl<T: Clone> OneOrMany<T> {
    /// Return the contained items as a list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }
}

/// An endpoint given either as a bare path or as a full block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Endpoint<T> {
    /// Bare path shorthand.
    Path(String),
    /// Full block.
    Block(T),
}

/// `src` block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceBlock {
    /// Source path; may contain `:latest`.
    pub path: String,
    /// Whether the path lives on the ssh host.
    #[serde(default)]
    pub remote: bool,
    /// rsync `--exclude` patterns.
    #[serde(default)]
    pub exclude: OneOrMany,
}

/// `dest` block. `path` may be omitted, in which case it is synthesized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DestBlock {
    /// Destination path.
    #[serde(default)]
    pub path: Option<String>,
    /// Whether the path lives on the ssh host.
    #[serde(default)]
    pub remote: bool,
    /// Number of snapshots to keep.
    #[serde(default)]
    pub copies: Option<u32>,
}

/// `ssh` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SshDefinition {
    /// Host name or address.
    #[serde(default)]
    pub host: Option<String>,
    /// Login user.
    #[serde(default)]
    pub username: Option<String>,
    /// Port, 22 when omitted.
    #[serde(default)]
    pub port: Option<u16>,
    /// Identity file.
    #[serde(default, rename = "privateKey")]
    pub private_key: Option<String>,
    /// Connect/command timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// A pre/post rsync command, given as a bare string or a block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HookDefinition {
    /// Bare command, run locally.
    Command(String),
    /// Command with an explicit location.
    Block {
        /// Shell command line.
        command: String,
        /// Run over ssh instead of locally.
        #[serde(default)]
        remote: bool,
    },
}

/// One task of the document, exactly as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskDefinition {
    /// Task name, used by `--task` and in banners.
    #[serde(default)]
    pub name: Option<String>,
    /// Connection settings for remote endpoints and hooks.
    #[serde(default)]
    pub ssh: Option<SshDefinition>,
    /// Source endpoint (required).
    #[serde(default)]
    pub src: Option<Endpoint<SourceBlock>>,
    /// Destination endpoint.
    #[serde(default)]
    pub dest: Option<Endpoint<DestBlock>>,
    /// rsync parameters replacing the defaults.
    #[serde(default)]
    pub params: Option<OneOrMany>,
    /// Commands run before the sync.
    #[serde(default, rename = "pre-rsync-cmd")]
    pub pre_hooks: OneOrMany<HookDefinition>,
    /// Commands run after the sync.
    #[serde(default, rename = "post-rsync-cmd")]
    pub post_hooks: OneOrMany<HookDefinition>,
}

impl TaskDefinition {
    /// Name used in error messages: the quoted task name, or `#<position>`
    /// (1-based) for unnamed tasks.
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map_or_else(|| format!("#{}", index + 1), |n| format!("\"{n}\""))
    }
}
