mod context;
mod flush_counters;
mod queue;
mod record_view;

pub use context::JobWorkerContext;
pub use flush_counters::{
    FlushCountersContext, FlushCountersJob, flush_counters_schedule, process_flush_counters_job,
};
pub use queue::enqueue_job;
pub use record_view::{RecordViewJobPayload, enqueue_record_view_job, process_record_view_job};
