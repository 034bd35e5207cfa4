// ── Interface snapshots and tether candidate selection ──
//
// The phone never says "tethering is up". The only evidence is a new
// network interface on the host, so detection compares two snapshots
// and classifies what it finds into three preference tiers.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

pub const LOOPBACK: &str = "lo";

/// Set of interface names seen at one instant, loopback excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSnapshot {
    names: BTreeSet<String>,
}

impl InterfaceSnapshot {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(Into::into).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names present here but absent from `before`.
    pub fn appeared_since(&self, before: &Self) -> Vec<String> {
        self.names.difference(&before.names).cloned().collect()
    }

    /// One name per line, the format of the on-disk snapshot files.
    pub fn to_lines(&self) -> String {
        let mut out = String::new();
        for name in &self.names {
            out.push_str(name);
            out.push('\n');
        }
        out
    }
}

impl FromIterator<String> for InterfaceSnapshot {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|name| name.trim().to_owned())
                .filter(|name| !name.is_empty() && name != LOOPBACK)
                .collect(),
        }
    }
}

/// Why an interface was put forward as the tether.
///
/// Variant order is preference order: explicit beats newly appeared
/// beats fallback.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CandidateKind {
    /// Name follows USB / RNDIS naming conventions.
    ExplicitMatch,
    /// Present after activation, absent before.
    NewlyAppeared,
    /// Any non-loopback interface.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceCandidate {
    pub name: String,
    pub kind: CandidateKind,
}

impl InterfaceCandidate {
    pub fn new(name: impl Into<String>, kind: CandidateKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for InterfaceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// Result of classifying a before/after snapshot pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Selected(InterfaceCandidate),
    /// More than one candidate in the winning tier. Needs a human.
    Ambiguous(Vec<InterfaceCandidate>),
    NotDetected,
}

/// Does this name look like a USB network function?
///
/// Covers the kernel's `usbN` / `rndisN`, MAC-based `enx...` names and
/// predictable names with a USB port path such as `enp0s20u1`.
pub fn is_tether_like(name: &str) -> bool {
    if name.starts_with("usb") || name.starts_with("rndis") || name.starts_with("enx") {
        return true;
    }
    let Some(rest) = name.strip_prefix("en") else {
        return false;
    };
    rest.as_bytes()
        .windows(2)
        .any(|pair| matches!(pair, [b'u', d] if d.is_ascii_digit()))
}

/// Pick the tether interface out of a before/after pair.
pub fn select_candidate(before: &InterfaceSnapshot, after: &InterfaceSnapshot) -> Selection {
    let explicit: Vec<&str> = after.names().filter(|name| is_tether_like(name)).collect();
    if let [only] = explicit.as_slice() {
        return Selection::Selected(InterfaceCandidate::new(*only, CandidateKind::ExplicitMatch));
    }
    if explicit.len() > 1 {
        // Several USB-looking names: the one that just appeared wins.
        let fresh: Vec<&str> = explicit
            .iter()
            .copied()
            .filter(|name| !before.contains(name))
            .collect();
        if let [only] = fresh.as_slice() {
            return Selection::Selected(InterfaceCandidate::new(
                *only,
                CandidateKind::ExplicitMatch,
            ));
        }
        let pool = if fresh.is_empty() { explicit } else { fresh };
        return ambiguous(pool, CandidateKind::ExplicitMatch);
    }

    let appeared = after.appeared_since(before);
    match appeared.as_slice() {
        [only] => {
            return Selection::Selected(InterfaceCandidate::new(
                only.clone(),
                CandidateKind::NewlyAppeared,
            ));
        }
        [] => {}
        _ => return ambiguous(appeared.iter().map(String::as_str), CandidateKind::NewlyAppeared),
    }

    let all: Vec<&str> = after.names().collect();
    match all.as_slice() {
        [] => Selection::NotDetected,
        [only] => Selection::Selected(InterfaceCandidate::new(*only, CandidateKind::Fallback)),
        _ => ambiguous(all, CandidateKind::Fallback),
    }
}

fn ambiguous<'a>(names: impl IntoIterator<Item = &'a str>, kind: CandidateKind) -> Selection {
    Selection::Ambiguous(
        names
            .into_iter()
            .map(|name| InterfaceCandidate::new(name, kind))
            .collect(),
    )
}
