// ==========================================
// 物资集散中心 - 引擎层
// ==========================================
// 职责: 实现业务流程（分配、出库、分拣、入库、开通）
// 红线: 多步写入在单个事务内完成；操作人显式传入
// ==========================================

pub mod allocation;
pub mod dispatch_finalize;
pub mod dispatch_state;
pub mod dispatch_wizard;
pub mod evidence;
pub mod intake;
pub mod provisioning;
pub mod triage;

// 重导出核心引擎
pub use allocation::{fefo_candidates, plan_allocation, AllocationPlan, AllocationSlice, ShortageIntent};
pub use dispatch_finalize::{AllocationWarning, DispatchFinalizer, FinalizeOutcome};
pub use dispatch_state::{DispatchStateMachine, TransitionRequest};
pub use dispatch_wizard::{
    CartLine, DispatchWizard, KitComponent, RectificationRow, WizardError, WizardStep,
};
pub use evidence::{EvidenceStore, LocalEvidenceStore};
pub use intake::{
    CrisisIntakeOutcome, CrisisIntakeRequest, DonorSelection, IntakeItem, IntakeService,
    NormalIntakeOutcome, NormalIntakeRequest, ProductIntakeResult,
};
pub use provisioning::{SqliteUserProvisioner, UserProvisioner};
pub use triage::{TriageOutcome, TriageProcessor, TriageRequest};
