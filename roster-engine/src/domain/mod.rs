pub mod assignment;
pub mod config;
pub mod demand;
pub mod employee;
pub mod request;
pub mod slot;

pub use assignment::{AssignmentRecord, AssignmentStatus, AuditInfo, HourBreakdown};
pub use config::{
    ConstraintConfig, ConstraintSetting, Enforcement, MonthlyHourLimit, OffsetPolicy,
    SolverRunTime, SolverScoreConfig,
};
pub use demand::{
    CoverageDays, DailyHeadcountEntry, DayType, DemandItem, Headcount, QualGroup, QualMatchType,
    QualificationSpec, Requirement, RosterList, RosteringBasis, ShiftDetail, ShiftGroup,
};
pub use employee::{Employee, Qualification};
pub use request::{
    EmployeeChanges, EmptySlotSpec, EmptySlotsRequest, IncrementalRequest, LockedContext,
    LockedEmployeeContext, OuOffset, PlanningHorizon, PreviousOutput, SolveRequest, TemporalWindow,
};
pub use slot::Slot;
