//! The request handler: a thin boundary mapping each wire method to a
//! scheduler call (spec §2 component 8, §4.5).
//!
//! Every branch below does exactly three things: look up the scheduler
//! (when the method needs one other than `Initialize`), call the matching
//! `skein_core::Scheduler` method, and translate the `Result` into a
//! [`Reply`]. No scheduling logic lives here — it is the seam the teacher's
//! own request-to-call boundaries in `durable-runtime` keep equally thin.

use skein_core::ErrorKind;
use skein_protocol::{ErrorCode, Reply, ReplyBody, Request};

use crate::context::Context;

/// Handle one request against `context`, producing the reply the wire
/// protocol expects.
pub fn handle(context: &Context, request: Request) -> Reply {
    match request {
        Request::Initialize {
            strategy_type,
            trace,
        } => match context.initialize(&strategy_type, trace.as_deref()) {
            Ok(scheduler_id) => Reply::ok(ReplyBody::SchedulerId { scheduler_id }),
            Err(_) => Reply::err(ErrorCode::Failure),
        },

        Request::Attach { scheduler_id } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler.attach().map(|main_operation_id| {
                ReplyBody::Attached {
                    iteration: scheduler.iteration_count(),
                    main_operation_id,
                }
            })
        }),

        Request::Detach { scheduler_id } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler.detach().map(|()| ReplyBody::Empty)
        }),

        Request::CreateOperation {
            scheduler_id,
            operation_id,
        } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler
                .create_operation(operation_id)
                .map(|()| ReplyBody::Empty)
        }),

        Request::StartOperation {
            scheduler_id,
            operation_id,
        } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler
                .start_operation(operation_id)
                .map(|()| ReplyBody::Empty)
        }),

        Request::WaitOperation {
            scheduler_id,
            operation_id,
        } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler
                .wait_operation(operation_id)
                .map(|next_operation_id| ReplyBody::NextOperation { next_operation_id })
        }),

        Request::CompleteOperation {
            scheduler_id,
            operation_id,
        } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler
                .complete_operation(operation_id)
                .map(|next_operation_id| ReplyBody::NextOperation { next_operation_id })
        }),

        Request::CreateResource {
            scheduler_id,
            resource_id,
        } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler
                .create_resource(resource_id)
                .map(|()| ReplyBody::Empty)
        }),

        Request::DeleteResource {
            scheduler_id,
            resource_id,
        } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler
                .delete_resource(resource_id)
                .map(|()| ReplyBody::Empty)
        }),

        Request::WaitResource {
            scheduler_id,
            resource_id,
        } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler
                .wait_resource(resource_id)
                .map(|next_operation_id| ReplyBody::NextOperation { next_operation_id })
        }),

        Request::SignalOperation {
            scheduler_id,
            resource_id,
            operation_id,
        } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler
                .signal_operation(resource_id, operation_id)
                .map(|()| ReplyBody::Empty)
        }),

        Request::SignalOperations {
            scheduler_id,
            resource_id,
        } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler
                .signal_operations(resource_id)
                .map(|()| ReplyBody::Empty)
        }),

        Request::ScheduleNext { scheduler_id } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler
                .schedule_next()
                .map(|next_operation_id| ReplyBody::NextOperation { next_operation_id })
        }),

        Request::GetNextBoolean { scheduler_id } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler.get_next_boolean().map(|value| ReplyBody::Boolean { value })
        }),

        Request::GetNextInteger {
            scheduler_id,
            max_value,
        } => with_scheduler(context, scheduler_id, |scheduler| {
            scheduler
                .get_next_integer(max_value)
                .map(|value| ReplyBody::Integer { value })
        }),

        Request::GetTrace { scheduler_id } => with_scheduler(context, scheduler_id, |scheduler| {
            Ok(ReplyBody::Trace {
                trace: scheduler.get_trace(),
            })
        }),
    }
}

/// Look up `scheduler_id`, mapping a miss to `NotExistingOperation` (the
/// closest taxonomy entry to "the id you gave me doesn't name anything"),
/// then run `body` against the scheduler and translate any error through
/// the taxonomy.
fn with_scheduler(
    context: &Context,
    scheduler_id: skein_core::Sid,
    body: impl FnOnce(&skein_core::Scheduler) -> skein_core::Result<ReplyBody>,
) -> Reply {
    let Some(scheduler) = context.get(scheduler_id) else {
        return Reply::err(ErrorCode::NotExistingOperation);
    };

    match body(&scheduler) {
        Ok(reply_body) => Reply::ok(reply_body),
        Err(err) => {
            let kind = err.kind();
            if is_noteworthy(kind) {
                tracing::warn!(%scheduler_id, ?kind, "scheduler call failed");
            } else {
                tracing::debug!(%scheduler_id, ?kind, "scheduler call failed");
            }
            Reply::err(ErrorCode::from(kind))
        }
    }
}

/// Whether `kind` should be logged at `warn` rather than `debug` — fatal
/// kinds are noteworthy even though they are protocol-level, not bugs.
fn is_noteworthy(kind: ErrorKind) -> bool {
    kind.is_fatal()
}
