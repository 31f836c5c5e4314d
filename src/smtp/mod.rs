//! Inbound SMTP listener.
//!
//! Supports HELO/EHLO, MAIL FROM, RCPT TO, DATA, RSET, NOOP, VRFY, QUIT.
//! Every read is bounded by the configured idle timeout.

pub mod delivery;
pub mod reply;
pub mod session;

use crate::app::AppState;
use reply::Reply;
use session::{Command, Session, Step};
use std::{io, net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    time::timeout,
};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Longest command line accepted, CRLF included.
pub const MAX_COMMAND_LINE: usize = 512;

/// Read size for one chunk of message data.
const DATA_CHUNK: u64 = 64 * 1024;

pub async fn start_smtp(state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(state.smtp.addr).await?;
    info!("smtp listener: {}", listener.local_addr()?);
    serve(listener, state).await
}

/// Accept connections forever, one task per client.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let state = state.clone();
        let span = info_span!("smtp", %peer, session = %Uuid::new_v4());
        tokio::spawn(
            async move {
                if let Err(e) = handle_client(state, stream, peer).await {
                    warn!("smtp connection error from {}: {}", peer, e);
                }
            }
            .instrument(span),
        );
    }
}

enum Line {
    Complete(Vec<u8>),
    TooLong,
    Closed,
    TimedOut,
}

enum Body {
    Complete(Vec<u8>),
    TooLarge,
    Closed,
    TimedOut,
}

async fn handle_client(state: AppState, stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let idle = state.smtp.idle_timeout;
    let mut session = Session::new(
        peer,
        state.smtp.hostname.clone(),
        state.policy.clone(),
        state.smtp.max_message_size,
    );
    info!("connection opened");
    send(&mut writer, &session.greeting()).await?;

    loop {
        let raw = match read_command(&mut reader, idle).await? {
            Line::Complete(raw) => raw,
            Line::TooLong => {
                send(&mut writer, &Reply::new(500, "Line too long")).await?;
                continue;
            }
            Line::Closed => {
                debug!("peer closed connection in state {:?}", session.state());
                break;
            }
            Line::TimedOut => {
                timed_out(&mut writer, &session).await?;
                break;
            }
        };
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(['\r', '\n']);
        debug!("smtp <= {}", line);

        match session.handle(Command::parse(line)) {
            Step::Reply(reply) => send(&mut writer, &reply).await?,
            Step::Quit(reply) => {
                send(&mut writer, &reply).await?;
                break;
            }
            Step::Data(reply) => {
                send(&mut writer, &reply).await?;
                match read_body(&mut reader, idle, state.smtp.max_message_size).await? {
                    Body::Complete(raw) => {
                        let envelope = session.take_envelope(raw);
                        let result = delivery::deliver(&state.store, envelope).await;
                        session.complete();
                        send(&mut writer, &delivery::reply_for(&result)).await?;
                    }
                    Body::TooLarge => {
                        warn!("message exceeded {} bytes", state.smtp.max_message_size);
                        session.reset_transaction();
                        send(
                            &mut writer,
                            &Reply::new(552, "Message exceeds fixed maximum message size"),
                        )
                        .await?;
                    }
                    Body::Closed => {
                        debug!("peer closed connection during DATA, transaction dropped");
                        break;
                    }
                    Body::TimedOut => {
                        timed_out(&mut writer, &session).await?;
                        break;
                    }
                }
            }
        }
    }
    info!("connection closed");
    Ok(())
}

async fn send(writer: &mut OwnedWriteHalf, reply: &Reply) -> io::Result<()> {
    let wire = reply.format();
    debug!("smtp => {}", wire.trim_end());
    writer.write_all(wire.as_bytes()).await?;
    writer.flush().await
}

async fn timed_out(writer: &mut OwnedWriteHalf, session: &Session) -> io::Result<()> {
    warn!("idle timeout in state {:?}", session.state());
    send(writer, &Reply::new(421, "Error: idle timeout, closing connection")).await
}

/// Read one command line, discarding the rest of an overlong line.
async fn read_command<R>(reader: &mut R, idle: Duration) -> io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut overlong = false;
    loop {
        buf.clear();
        let mut limited = (&mut *reader).take(MAX_COMMAND_LINE as u64);
        let n = match timeout(idle, limited.read_until(b'\n', &mut buf)).await {
            Ok(n) => n?,
            Err(_) => return Ok(Line::TimedOut),
        };
        if n == 0 {
            return Ok(Line::Closed);
        }
        if buf.ends_with(b"\n") {
            return Ok(if overlong {
                Line::TooLong
            } else {
                Line::Complete(buf)
            });
        }
        overlong = true;
    }
}

/// Read message data up to the lone `.` line, undoing dot-stuffing.
///
/// Oversized bodies are read to the end and dropped so the session stays in sync.
async fn read_body<R>(reader: &mut R, idle: Duration, max_size: usize) -> io::Result<Body>
where
    R: AsyncBufRead + Unpin,
{
    let mut data = Vec::new();
    let mut buf = Vec::new();
    let mut line_start = true;
    let mut too_large = false;
    loop {
        buf.clear();
        let mut limited = (&mut *reader).take(DATA_CHUNK);
        let n = match timeout(idle, limited.read_until(b'\n', &mut buf)).await {
            Ok(n) => n?,
            Err(_) => return Ok(Body::TimedOut),
        };
        if n == 0 {
            return Ok(Body::Closed);
        }
        if line_start && (buf == b".\r\n" || buf == b".\n") {
            break;
        }
        let chunk = if line_start && buf.starts_with(b".") {
            &buf[1..]
        } else {
            &buf[..]
        };
        if !too_large {
            if data.len() + chunk.len() > max_size {
                too_large = true;
                data = Vec::new();
            } else {
                data.extend_from_slice(chunk);
            }
        }
        line_start = buf.ends_with(b"\n");
    }
    Ok(if too_large {
        Body::TooLarge
    } else {
        Body::Complete(data)
    })
}
