mod warm;

pub use warm::{
    WarmCacheContext, WarmCacheJob, parse_warm_schedule, process_warm_cache_job,
    spawn_warm_worker,
};
