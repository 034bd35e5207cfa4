// revtether-core: reverse-tethering session logic between the host
// collaborators (adb, iproute2, procfs) and the consumers (CLI).

pub mod activator;
pub mod artifacts;
pub mod config;
pub mod configurator;
pub mod discovery;
pub mod error;
pub mod host;
pub mod model;
pub mod resolver;
pub mod session;
pub mod tuner;

// ── Primary re-exports ──────────────────────────────────────────────
pub use activator::{Activation, TetheringActivator};
pub use artifacts::SessionArtifacts;
pub use config::{MtuPolicy, SessionConfig, SessionPaths, TetherSettings, TuningSettings};
pub use configurator::{ConfigReport, Connectivity, NetworkConfigurator};
pub use discovery::DeviceSessionManager;
pub use error::CoreError;
pub use host::{
    Approver, Capabilities, CommandExecutor, NetworkInspector, NetworkMutator, ShellOutput,
    ThroughputProbe,
};
pub use resolver::{ResolverFiles, RestoreOutcome};
pub use session::{Session, SessionReport};
pub use tuner::{MtuChoice, PerformanceTuner, TuningReport};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Devices
    AuthorizationState, Device,
    // Interfaces
    CandidateKind, InterfaceCandidate, InterfaceSnapshot, Selection,
    // Network state
    Diagnostics, InterfaceAddress, InterfaceState, LinkState, NetworkConfig, PingReport,
    PingRequest, ResolverBackup, RouteEntry, Throughput,
    // Session
    SessionResult, SessionState,
};
