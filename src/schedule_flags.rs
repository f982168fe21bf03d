//! Per-frame scheduler and diagnostic knobs (the closed enumeration from
//! the external-interfaces section of the design notes).

bitflags! {
    #[derive(Default)]
    pub struct ScheduleFlags: u16 {
        const DISABLE_DEAD_CODE_ELIMINATION      = 1 << 0;
        const ALLOW_SPLIT_BARRIERS                = 1 << 1;
        const PREFER_MEMORY_SAVING                = 1 << 2;
        const MINIMIZE_COMPUTE_GFX_SWITCH         = 1 << 3;
        const WORKLOAD_TYPE_PIPELINING_DISABLE    = 1 << 4;
        const WORKLOAD_TYPE_PIPELINING_AGGRESSIVE = 1 << 5;
        const KEEP_PROGRAM_ORDER                  = 1 << 6;
        const RANDOM_ORDER                        = 1 << 7;
    }
}

bitflags! {
    #[derive(Default)]
    pub struct DiagnosticFlags: u8 {
        const ENABLE_DAG_DUMP              = 1 << 0;
        const ENABLE_PRE_SCHEDULE_DUMP     = 1 << 1;
        const ENABLE_POST_SCHEDULE_DUMP    = 1 << 2;
        const ENABLE_RUNTIME_DEBUG_NAMES   = 1 << 3;
    }
}
