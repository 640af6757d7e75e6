//! Allow-list of exact command invocations the daemon will run as root.
//!
//! Every permitted invocation is one [`Rule`] in [`ALLOW_LIST`]: a command
//! name plus one matcher per positional argument. One generic routine
//! evaluates the table, so adding or auditing a capability is a data diff.
//!
//! Pure and synchronous: no I/O, no async.

use std::path::Path;

use mc_common::naming::{self, CONFIG_TEMPLATE, TENANTS_DIR, UNIT_TARGET, UNIT_TEMPLATE};
use thiserror::Error;

/// Directory modes `install -d -m` may use.
pub const ALLOWED_MODES: &[&str] = &["0750", "0700"];

/// System accounts that satisfy the username pattern but must never be
/// created, deleted or have their home touched.
pub const RESERVED_USERS: &[&str] = &[
    "root", "daemon", "bin", "sys", "sync", "games", "man", "lp", "mail", "news", "uucp",
    "proxy", "www-data", "backup", "list", "irc", "gnats", "nobody", "_apt", "sshd",
    "messagebus", "syslog", "openclaw",
];

/// Matcher for one positional argument.
#[derive(Debug, Clone, Copy)]
pub enum Arg {
    /// Exactly this string.
    Lit(&'static str),
    /// One of a closed set.
    OneOf(&'static [&'static str]),
    /// A safe username.
    User,
    /// `<user>:<user>`.
    OwnerPair,
    /// `<prefix><user><suffix>`.
    Templated {
        prefix: &'static str,
        suffix: &'static str,
    },
}

/// One permitted invocation shape.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub command: &'static str,
    pub args: &'static [Arg],
}

const HOME_OPENCLAW: Arg = Arg::Templated {
    prefix: "/home/",
    suffix: "/.openclaw",
};
const HOME_WORKSPACE: Arg = Arg::Templated {
    prefix: "/home/",
    suffix: "/workspace",
};
const HOME: Arg = Arg::Templated {
    prefix: "/home/",
    suffix: "",
};
const TENANT_CONFIG: Arg = Arg::Templated {
    prefix: "/home/",
    suffix: "/.openclaw/openclaw.json",
};
const TENANT_ENV: Arg = Arg::Templated {
    prefix: "/etc/openclaw-tenants/",
    suffix: ".env",
};
const STAGED_ENV: Arg = Arg::Templated {
    prefix: "/var/lib/mission-control/tenant-env/",
    suffix: ".env",
};
const GATEWAY_SERVICE: Arg = Arg::Templated {
    prefix: "openclaw-gateway@",
    suffix: ".service",
};
const MODE: Arg = Arg::OneOf(ALLOWED_MODES);

/// Every invocation the daemon accepts. Order only matters for which
/// rejection reason is reported when nothing matches.
pub static ALLOW_LIST: &[Rule] = &[
    Rule {
        command: "useradd",
        args: &[Arg::Lit("-m"), Arg::Lit("-s"), Arg::Lit("/bin/bash"), Arg::User],
    },
    Rule {
        command: "install",
        args: &[
            Arg::Lit("-d"),
            Arg::Lit("-m"),
            MODE,
            Arg::Lit("-o"),
            Arg::Lit("root"),
            Arg::Lit("-g"),
            Arg::Lit("root"),
            Arg::Lit(TENANTS_DIR),
        ],
    },
    Rule {
        command: "install",
        args: &[
            Arg::Lit("-d"),
            Arg::Lit("-m"),
            MODE,
            Arg::Lit("-o"),
            Arg::User,
            Arg::Lit("-g"),
            Arg::User,
            HOME_OPENCLAW,
        ],
    },
    Rule {
        command: "install",
        args: &[
            Arg::Lit("-d"),
            Arg::Lit("-m"),
            MODE,
            Arg::Lit("-o"),
            Arg::User,
            Arg::Lit("-g"),
            Arg::User,
            HOME_WORKSPACE,
        ],
    },
    Rule {
        command: "cp",
        args: &[Arg::Lit("-n"), Arg::Lit(CONFIG_TEMPLATE), TENANT_CONFIG],
    },
    Rule {
        command: "cp",
        args: &[Arg::Lit("-n"), Arg::Lit(UNIT_TEMPLATE), Arg::Lit(UNIT_TARGET)],
    },
    Rule {
        command: "cp",
        args: &[Arg::Lit("-f"), STAGED_ENV, TENANT_ENV],
    },
    Rule {
        command: "chown",
        args: &[Arg::Lit("-R"), Arg::OwnerPair, HOME],
    },
    Rule {
        command: "rm",
        args: &[Arg::Lit("-f"), TENANT_ENV],
    },
    Rule {
        command: "rm",
        args: &[Arg::Lit("-rf"), HOME_OPENCLAW],
    },
    Rule {
        command: "rm",
        args: &[Arg::Lit("-rf"), HOME_WORKSPACE],
    },
    Rule {
        command: "userdel",
        args: &[Arg::Lit("-r"), Arg::User],
    },
    Rule {
        command: "true",
        args: &[],
    },
    Rule {
        command: "systemctl",
        args: &[Arg::Lit("daemon-reload")],
    },
    Rule {
        command: "systemctl",
        args: &[Arg::Lit("enable"), Arg::Lit("--now"), GATEWAY_SERVICE],
    },
    Rule {
        command: "systemctl",
        args: &[Arg::Lit("disable"), Arg::Lit("--now"), GATEWAY_SERVICE],
    },
];

/// Why a request was refused. Displayed verbatim to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Command not allowed: {0}")]
    CommandNotAllowed(String),

    #[error("{command}: expected {expected} argument(s), got {got}")]
    Arity {
        command: &'static str,
        expected: String,
        got: usize,
    },

    #[error("{command}: argument {position} '{value}' {problem}")]
    Argument {
        command: &'static str,
        position: usize,
        value: String,
        problem: String,
    },

    #[error("{command}: arguments name different users ('{first}' and '{second}')")]
    UserMismatch {
        command: &'static str,
        position: usize,
        first: String,
        second: String,
    },
}

impl Rejection {
    /// How far into the argument list matching got; used to pick the most
    /// specific reason among alternative rules.
    fn depth(&self) -> usize {
        match self {
            Self::Argument { position, .. } | Self::UserMismatch { position, .. } => *position,
            Self::CommandNotAllowed(_) | Self::Arity { .. } => 0,
        }
    }
}

/// A request that passed validation, normalized to the allow-listed name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: &'static str,
    pub args: Vec<String>,
}

/// Decides whether a command may run. The daemon holds one of these.
pub trait CommandValidator: Send + Sync {
    /// Validate `command` with `args`.
    ///
    /// # Errors
    ///
    /// Returns the reason the invocation is not on the allow-list.
    fn validate(&self, command: &str, args: &[String]) -> Result<Invocation, Rejection>;
}

/// Production validator backed by a static rule table.
#[derive(Debug, Clone, Copy)]
pub struct AllowList {
    rules: &'static [Rule],
}

impl AllowList {
    #[must_use]
    pub fn new(rules: &'static [Rule]) -> Self {
        Self { rules }
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(ALLOW_LIST)
    }
}

impl CommandValidator for AllowList {
    fn validate(&self, command: &str, args: &[String]) -> Result<Invocation, Rejection> {
        let name = base_name(command)
            .ok_or_else(|| Rejection::CommandNotAllowed(command.to_string()))?;

        let candidates: Vec<&Rule> = self.rules.iter().filter(|r| r.command == name).collect();
        let Some(first) = candidates.first() else {
            return Err(Rejection::CommandNotAllowed(command.to_string()));
        };
        let program = first.command;

        let mut best: Option<Rejection> = None;
        for rule in candidates.iter().filter(|r| r.args.len() == args.len()) {
            match match_rule(rule, args) {
                Ok(()) => {
                    return Ok(Invocation {
                        program,
                        args: args.to_vec(),
                    });
                }
                Err(rejection) => {
                    if best.as_ref().is_none_or(|b| rejection.depth() > b.depth()) {
                        best = Some(rejection);
                    }
                }
            }
        }

        Err(best.unwrap_or_else(|| {
            let mut arities: Vec<usize> = candidates.iter().map(|r| r.args.len()).collect();
            arities.sort_unstable();
            arities.dedup();
            Rejection::Arity {
                command: program,
                expected: arities
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" or "),
                got: args.len(),
            }
        }))
    }
}

/// Validate against the built-in allow-list.
///
/// # Errors
///
/// Returns the reason the invocation is refused.
pub fn validate(command: &str, args: &[String]) -> Result<Invocation, Rejection> {
    AllowList::default().validate(command, args)
}

fn base_name(command: &str) -> Option<&str> {
    Path::new(command)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
}

fn match_rule(rule: &Rule, args: &[String]) -> Result<(), Rejection> {
    let mut bound: Option<&str> = None;

    for (index, (matcher, value)) in rule.args.iter().zip(args).enumerate() {
        let position = index + 1;
        let captured = capture(*matcher, value).map_err(|problem| Rejection::Argument {
            command: rule.command,
            position,
            value: value.clone(),
            problem,
        })?;

        let Some(user) = captured else { continue };
        if RESERVED_USERS.contains(&user) {
            return Err(Rejection::Argument {
                command: rule.command,
                position,
                value: value.clone(),
                problem: format!("names reserved account '{user}'"),
            });
        }
        match bound {
            None => bound = Some(user),
            Some(first) if first != user => {
                return Err(Rejection::UserMismatch {
                    command: rule.command,
                    position,
                    first: first.to_string(),
                    second: user.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Match one argument, returning the username it names, if any.
fn capture(matcher: Arg, value: &str) -> Result<Option<&str>, String> {
    match matcher {
        Arg::Lit(expected) => {
            if value == expected {
                Ok(None)
            } else {
                Err(format!("must be '{expected}'"))
            }
        }
        Arg::OneOf(options) => {
            if options.contains(&value) {
                Ok(None)
            } else {
                Err(format!("must be one of {}", options.join(", ")))
            }
        }
        Arg::User => {
            if naming::is_valid_username(value) {
                Ok(Some(value))
            } else {
                Err("is not a valid username".to_string())
            }
        }
        Arg::OwnerPair => match value.split_once(':') {
            Some((owner, group)) if owner == group && naming::is_valid_username(owner) => {
                Ok(Some(owner))
            }
            _ => Err("must be '<user>:<user>' with a valid username".to_string()),
        },
        Arg::Templated { prefix, suffix } => value
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
            .filter(|user| naming::is_valid_username(user))
            .map(Some)
            .ok_or_else(|| format!("must match {prefix}<user>{suffix}")),
    }
}
