//! Lead and student lifecycle services.
//!
//! Every operation opens one unit of work on the [`Store`](academy_db::Store),
//! writes its audit entries inside it, and publishes events only after the
//! commit succeeds.

pub mod approvals;
pub mod attendance;
pub mod audit;
pub mod capacity;
pub mod context;
pub mod conversion;
pub mod engine;
pub mod expiry;
pub mod intake;
pub mod nurture;
pub mod outbox;
pub mod roster;

pub use approvals::{ApprovalGovernance, CreateApproval};
pub use attendance::Attendance;
pub use audit::{AuditLog, ChainVerification};
pub use capacity::CapacityChecker;
pub use context::{Actor, Context};
pub use conversion::{ConversionRequest, StudentConversion, StudentUpdate};
pub use engine::{LifecycleEngine, TransitionFields};
pub use expiry::ExpiryScheduler;
pub use intake::{LeadIntake, PreferenceSubmission, SkillReportInput, SubscriptionSubmission};
pub use roster::BatchRoster;

/// All lifecycle services over one shared [`Context`].
#[derive(Clone)]
pub struct Academy {
    pub ctx: Context,
    pub leads: LeadIntake,
    pub engine: LifecycleEngine,
    pub conversion: StudentConversion,
    pub approvals: ApprovalGovernance,
    pub expiry: ExpiryScheduler,
    pub roster: BatchRoster,
    pub capacity: CapacityChecker,
    pub audit: AuditLog,
}

impl Academy {
    pub fn new(ctx: Context) -> Self {
        Self {
            leads: LeadIntake::new(ctx.clone()),
            engine: LifecycleEngine::new(ctx.clone()),
            conversion: StudentConversion::new(ctx.clone()),
            approvals: ApprovalGovernance::new(ctx.clone()),
            expiry: ExpiryScheduler::new(ctx.clone()),
            roster: BatchRoster::new(ctx.clone()),
            capacity: CapacityChecker::new(ctx.clone()),
            audit: AuditLog::new(ctx.clone()),
            ctx,
        }
    }
}
