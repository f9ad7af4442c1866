use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::time::{Instant, timeout};
use tracing::debug;

use super::{ConnectionOutcome, ConnectionTarget, SystemError, TimeoutBudget};

/// Result of issuing the connect request on a non-blocking socket.
enum Connecting {
    Established,
    InProgress,
}

/// Runs one connection attempt against `target`, waiting at most `budget`
/// for the connect to complete.
///
/// The socket lives only for the duration of this call and is closed on every
/// path. Readiness after the wait is never taken as success on its own: the
/// socket's pending error decides between `Connected` and `Refused`.
pub async fn attempt(target: ConnectionTarget, budget: TimeoutBudget) -> ConnectionOutcome {
    let addr = target.socket_addr();
    let start = Instant::now();

    let outcome = match connect(addr, budget).await {
        Ok(()) => ConnectionOutcome::Connected,
        Err(outcome) => outcome,
    };

    debug!(%addr, ?outcome, elapsed = ?start.elapsed(), "tcp connect attempt finished");
    outcome
}

async fn connect(addr: SocketAddr, budget: TimeoutBudget) -> Result<(), ConnectionOutcome> {
    let socket = open(addr)?;

    match start_connect(&socket, addr)? {
        Connecting::Established => {
            debug!(%addr, "connect completed immediately");
            return Ok(());
        }
        Connecting::InProgress => {
            debug!(%addr, timeout = budget.as_secs(), "initiated non-blocking connect");
        }
    }

    let socket = wait_ready(socket, budget).await?;
    pending_error(socket.get_ref())
}

/// Init and configure: a stream socket of the target's family, non-blocking
/// from here on.
fn open(addr: SocketAddr) -> Result<Socket, ConnectionOutcome> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ConnectionOutcome::SetupFailed(SystemError::from(&e)))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| ConnectionOutcome::SetupFailed(SystemError::from(&e)))?;
    Ok(socket)
}

fn start_connect(socket: &Socket, addr: SocketAddr) -> Result<Connecting, ConnectionOutcome> {
    match socket.connect(&addr.into()) {
        Ok(()) => Ok(Connecting::Established),
        Err(e) if is_in_progress(&e) => Ok(Connecting::InProgress),
        Err(e) => Err(ConnectionOutcome::Refused(SystemError::from(&e))),
    }
}

fn is_in_progress(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EINPROGRESS) || err.kind() == io::ErrorKind::WouldBlock
}

/// Single bounded wait for the socket to turn readable or writable.
async fn wait_ready(
    socket: Socket,
    budget: TimeoutBudget,
) -> Result<AsyncFd<Socket>, ConnectionOutcome> {
    // One registration covers both directions.
    let interest = Interest::READABLE | Interest::WRITABLE;
    let socket = AsyncFd::with_interest(socket, interest)
        .map_err(|e| ConnectionOutcome::SetupFailed(SystemError::from(&e)))?;

    let ready = match timeout(budget.as_duration(), socket.ready(interest)).await {
        Ok(Ok(guard)) => guard.ready(),
        Ok(Err(e)) => return Err(ConnectionOutcome::Refused(SystemError::from(&e))),
        Err(_elapsed) => return Err(ConnectionOutcome::TimedOut),
    };
    debug!(?ready, "socket signalled readiness");

    Ok(socket)
}

/// Deferred connect status (`SO_ERROR`).
fn pending_error(socket: &Socket) -> Result<(), ConnectionOutcome> {
    match socket.take_error() {
        Ok(None) => Ok(()),
        Ok(Some(e)) | Err(e) => Err(ConnectionOutcome::Refused(SystemError::from(&e))),
    }
}
