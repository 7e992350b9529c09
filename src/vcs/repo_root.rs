use std::sync::OnceLock;

use regex_lite::Regex;

use super::{VcsError, VcsKind};

/// The repository owning an import path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRoot {
    pub vcs: VcsKind,
    /// URL the repository is fetched from.
    pub repo: String,
    /// Import path prefix corresponding to the repository root.
    pub root: String,
}

struct HostRule {
    prefix: &'static str,
    pattern: &'static str,
    /// `None` when the pattern captures the VCS in a `vcs` group.
    vcs: Option<VcsKind>,
}

const HOST_RULES: &[HostRule] = &[
    HostRule {
        prefix: "github.com/",
        pattern: r"^(?P<root>github\.com/[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+)(/[A-Za-z0-9_.\-]+)*$",
        vcs: Some(VcsKind::Git),
    },
    HostRule {
        prefix: "bitbucket.org/",
        pattern: r"^(?P<root>bitbucket\.org/[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+)(/[A-Za-z0-9_.\-]+)*$",
        vcs: Some(VcsKind::Git),
    },
    HostRule {
        prefix: "launchpad.net/",
        pattern: r"^(?P<root>launchpad\.net/(~[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+|[A-Za-z0-9_.\-]+))(/[A-Za-z0-9_.\-]+)*$",
        vcs: Some(VcsKind::Bazaar),
    },
    HostRule {
        prefix: "hub.jazz.net/git/",
        pattern: r"^(?P<root>hub\.jazz\.net/git/[a-z0-9]+/[A-Za-z0-9_.\-]+)(/[A-Za-z0-9_.\-]+)*$",
        vcs: Some(VcsKind::Git),
    },
    HostRule {
        prefix: "git.apache.org/",
        pattern: r"^(?P<root>git\.apache\.org/[a-z0-9_.\-]+\.git)(/[A-Za-z0-9_.\-]+)*$",
        vcs: Some(VcsKind::Git),
    },
    HostRule {
        prefix: "",
        pattern: r"^(?P<root>([a-z0-9.\-]+\.)+[a-z0-9.\-]+(:[0-9]+)?(/~?[A-Za-z0-9_.\-]+)+?\.(?P<vcs>bzr|git|hg|svn))(/~?[A-Za-z0-9_.\-]+)*$",
        vcs: None,
    },
];

fn compiled_rules() -> &'static [(&'static HostRule, Regex)] {
    static RULES: OnceLock<Vec<(&'static HostRule, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        HOST_RULES
            .iter()
            .map(|rule| {
                let regex = Regex::new(rule.pattern).expect("host rule patterns are valid");
                (rule, regex)
            })
            .collect()
    })
}

/// Maps an import path to its repository using the well-known hosting rules
/// and explicit `.git`/`.hg`/`.svn`/`.bzr` path qualifiers.
pub fn repo_root_for_import_path(import_path: &str) -> Result<RepoRoot, VcsError> {
    for (rule, regex) in compiled_rules() {
        if !import_path.starts_with(rule.prefix) {
            continue;
        }
        let Some(captures) = regex.captures(import_path) else {
            continue;
        };
        let vcs = rule.vcs.or_else(|| {
            captures
                .name("vcs")
                .and_then(|vcs| VcsKind::from_command(vcs.as_str()))
        });
        if let (Some(vcs), Some(root)) = (vcs, captures.name("root")) {
            let root = root.as_str().to_owned();
            return Ok(RepoRoot {
                vcs,
                repo: format!("https://{root}"),
                root,
            });
        }
    }
    Err(VcsError::UnknownImportPath(import_path.to_owned()))
}
