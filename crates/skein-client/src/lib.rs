//! `skein-client`: a typed client for the skein scheduler's reference
//! transport (newline-delimited JSON over TCP).
//!
//! Suitable both for `skein-test`'s scenario harness and, per spec §1, as
//! the dependency a program-under-test's instrumentation layer would use to
//! announce concurrency events to the scheduler. Modeled on
//! `durable_client::DurableClient`: one struct owning the connection state,
//! a thin method per wire operation, typed errors via [`ClientError`].

mod error;

use skein_core::Sid;
use skein_protocol::{ReplyBody, Request};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

pub use crate::error::{ClientError, ClientErrorKind};

/// A connection to one skein scheduler session's wire transport.
///
/// Not `Clone` or `Sync`: one connection drives exactly one logical
/// program-under-test session, matching the scheduler's own "single
/// attached client" invariant (spec §4.3's `Attach`/`Detach`).
pub struct SkeinClient {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl SkeinClient {
    /// Connect to a `skein-server` instance at `addr`.
    pub async fn connect(addr: impl ToSocketAddrs) -> error::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half).lines(),
            writer,
        })
    }

    async fn call(&mut self, request: Request) -> error::Result<ReplyBody> {
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;

        let reply_line = self
            .reader
            .next_line()
            .await?
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "scheduler closed the connection"))?;
        let reply: skein_protocol::Reply = serde_json::from_str(&reply_line)?;

        if reply.error_code == skein_protocol::ErrorCode::Success {
            Ok(reply.body)
        } else {
            Err(error::scheduler_error(reply.error_code))
        }
    }

    /// `Initialize`: create a new session with the given strategy type and
    /// optional replay trace. Returns the assigned `schedulerId`.
    pub async fn initialize(&mut self, strategy_type: &str, trace: Option<&str>) -> error::Result<Sid> {
        let body = self
            .call(Request::Initialize {
                strategy_type: strategy_type.to_owned(),
                trace: trace.map(str::to_owned),
            })
            .await?;

        match body {
            ReplyBody::SchedulerId { scheduler_id } => Ok(scheduler_id),
            _ => Err(unexpected_body()),
        }
    }

    /// `Attach`: returns `(iteration, mainOperationId)`.
    pub async fn attach(&mut self, scheduler_id: Sid) -> error::Result<(u64, Sid)> {
        let body = self.call(Request::Attach { scheduler_id }).await?;
        match body {
            ReplyBody::Attached {
                iteration,
                main_operation_id,
            } => Ok((iteration, main_operation_id)),
            _ => Err(unexpected_body()),
        }
    }

    pub async fn detach(&mut self, scheduler_id: Sid) -> error::Result<()> {
        self.call(Request::Detach { scheduler_id }).await?;
        Ok(())
    }

    pub async fn create_operation(&mut self, scheduler_id: Sid, operation_id: Sid) -> error::Result<()> {
        self.call(Request::CreateOperation {
            scheduler_id,
            operation_id,
        })
        .await?;
        Ok(())
    }

    pub async fn start_operation(&mut self, scheduler_id: Sid, operation_id: Sid) -> error::Result<()> {
        self.call(Request::StartOperation {
            scheduler_id,
            operation_id,
        })
        .await?;
        Ok(())
    }

    pub async fn wait_operation(&mut self, scheduler_id: Sid, operation_id: Sid) -> error::Result<Sid> {
        let body = self
            .call(Request::WaitOperation {
                scheduler_id,
                operation_id,
            })
            .await?;
        next_operation_id(body)
    }

    pub async fn complete_operation(&mut self, scheduler_id: Sid, operation_id: Sid) -> error::Result<Sid> {
        let body = self
            .call(Request::CompleteOperation {
                scheduler_id,
                operation_id,
            })
            .await?;
        next_operation_id(body)
    }

    pub async fn create_resource(&mut self, scheduler_id: Sid, resource_id: Sid) -> error::Result<()> {
        self.call(Request::CreateResource {
            scheduler_id,
            resource_id,
        })
        .await?;
        Ok(())
    }

    pub async fn delete_resource(&mut self, scheduler_id: Sid, resource_id: Sid) -> error::Result<()> {
        self.call(Request::DeleteResource {
            scheduler_id,
            resource_id,
        })
        .await?;
        Ok(())
    }

    pub async fn wait_resource(&mut self, scheduler_id: Sid, resource_id: Sid) -> error::Result<Sid> {
        let body = self
            .call(Request::WaitResource {
                scheduler_id,
                resource_id,
            })
            .await?;
        next_operation_id(body)
    }

    pub async fn signal_operation(
        &mut self,
        scheduler_id: Sid,
        resource_id: Sid,
        operation_id: Sid,
    ) -> error::Result<()> {
        self.call(Request::SignalOperation {
            scheduler_id,
            resource_id,
            operation_id,
        })
        .await?;
        Ok(())
    }

    pub async fn signal_operations(&mut self, scheduler_id: Sid, resource_id: Sid) -> error::Result<()> {
        self.call(Request::SignalOperations {
            scheduler_id,
            resource_id,
        })
        .await?;
        Ok(())
    }

    pub async fn schedule_next(&mut self, scheduler_id: Sid) -> error::Result<Sid> {
        let body = self.call(Request::ScheduleNext { scheduler_id }).await?;
        next_operation_id(body)
    }

    pub async fn get_next_boolean(&mut self, scheduler_id: Sid) -> error::Result<bool> {
        let body = self.call(Request::GetNextBoolean { scheduler_id }).await?;
        match body {
            ReplyBody::Boolean { value } => Ok(value),
            _ => Err(unexpected_body()),
        }
    }

    pub async fn get_next_integer(&mut self, scheduler_id: Sid, max_value: u64) -> error::Result<u64> {
        let body = self
            .call(Request::GetNextInteger {
                scheduler_id,
                max_value,
            })
            .await?;
        match body {
            ReplyBody::Integer { value } => Ok(value),
            _ => Err(unexpected_body()),
        }
    }

    pub async fn get_trace(&mut self, scheduler_id: Sid) -> error::Result<String> {
        let body = self.call(Request::GetTrace { scheduler_id }).await?;
        match body {
            ReplyBody::Trace { trace } => Ok(trace),
            _ => Err(unexpected_body()),
        }
    }
}

fn next_operation_id(body: ReplyBody) -> error::Result<Sid> {
    match body {
        ReplyBody::NextOperation { next_operation_id } => Ok(next_operation_id),
        _ => Err(unexpected_body()),
    }
}

fn unexpected_body() -> ClientError {
    std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        "scheduler returned a reply shape the requested method does not expect",
    )
    .into()
}
