// ── Domain model ──
//
// Plain data types shared by the session components and the CLI.
// Nothing here talks to the host.

mod device;
mod interface;
mod network;
mod session;

pub use device::{AuthorizationState, Device};
pub use interface::{
    CandidateKind, InterfaceCandidate, InterfaceSnapshot, LOOPBACK, Selection, is_tether_like,
    select_candidate,
};
pub use network::{
    Diagnostics, InterfaceAddress, InterfaceState, LinkState, NetworkConfig, PingReport,
    PingRequest, ResolverBackup, RouteEntry, Throughput,
};
pub use session::{SessionResult, SessionState};
