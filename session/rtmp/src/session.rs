use std::{
    future::Future,
    io,
    pin::Pin,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU32, Ordering},
    },
    task::{Context, Poll},
    time::{Duration, Instant},
};

use amf::Value;
use rtmp_formats::{
    chunk::{self, ChunkMessage, ChunkMessageCommonHeader, default_csid},
    commands::{Invoke, Notify, consts::ONE_WAY_INVOCATION_ID},
    message::RtmpMessage,
    protocol_control::{ChunkLength, PeerBandwidthLimitType},
    user_control::{UserControlEventType, UserControlMessage},
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tokio_util::{
    bytes::{Bytes, BytesMut},
    sync::CancellationToken,
};
use tracing::instrument;
use unified_io::zlib::{AsyncZlibStream, Compression, CompressionMode};

use crate::{
    config::RtmpSessionConfig,
    errors::{InvokeError, RtmpSessionError, RtmpSessionResult},
    invocation::{InvocationHandle, InvocationResult, PendingInvocations},
};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

const CONTROL_MESSAGE_STREAM_ID: u32 = 0;
const READ_BUFFER_CAPACITY: usize = 4096;

/// Something the session received that no pending call was waiting for.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A call made by the peer, `onStatus` for instance.
    Invoke {
        header: ChunkMessageCommonHeader,
        invoke: Invoke,
    },
    Notify {
        header: ChunkMessageCommonHeader,
        notify: Notify,
    },
    Audio {
        header: ChunkMessageCommonHeader,
        payload: Bytes,
    },
    Video {
        header: ChunkMessageCommonHeader,
        payload: Bytes,
    },
    UserControl(UserControlMessage),
    PeerBandwidth {
        ack_window_size: u32,
        limit_type: PeerBandwidthLimitType,
    },
    /// Always the last event of a session.
    Closed { reason: String },
}

#[derive(Debug)]
enum Outbound {
    Message {
        message_stream_id: u32,
        timestamp: Option<u32>,
        message: RtmpMessage,
        payload: Vec<u8>,
    },
    Close,
}

struct SessionShared {
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: PendingInvocations<u32, Invoke, InvokeError>,
    next_invocation_id: AtomicU32,
    object_encoding: amf::Version,
    cancel: CancellationToken,
    close_reason: Mutex<Option<String>>,
}

impl SessionShared {
    /// Encodes on the caller side, so a message the chunk writer would refuse
    /// is reported here and never reaches the write loop.
    fn enqueue(
        &self,
        message_stream_id: u32,
        timestamp: Option<u32>,
        message: RtmpMessage,
    ) -> RtmpSessionResult<()> {
        if self.cancel.is_cancelled() {
            return Err(RtmpSessionError::SessionClosed);
        }
        let payload = chunk::writer::encode_payload(&message)?;
        self.outbound
            .send(Outbound::Message {
                message_stream_id,
                timestamp,
                message,
                payload,
            })
            .map_err(|_| RtmpSessionError::SessionClosed)
    }

    fn next_invocation_id(&self) -> u32 {
        loop {
            let id = self.next_invocation_id.fetch_add(1, Ordering::Relaxed);
            if id != ONE_WAY_INVOCATION_ID {
                return id;
            }
        }
    }

    /// Stops both loops and fails every pending call, returns the reason that won.
    fn shutdown(&self, reason: &str) -> String {
        let reason = self
            .close_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(|| reason.to_owned())
            .clone();
        self.cancel.cancel();

        let failed = self
            .pending
            .set_exception_for_all(InvokeError::ConnectionClosed {
                reason: reason.clone(),
            });
        if failed > 0 {
            tracing::info!("{} pending invocations failed, reason: {}", failed, reason);
        }
        let _ = self.outbound.send(Outbound::Close);
        reason
    }
}

/// An invocation waiting for its `_result` or `_error` reply.
pub struct PendingInvoke {
    invocation_id: u32,
    handle: InvocationHandle<Invoke, InvokeError>,
}

impl PendingInvoke {
    pub fn invocation_id(&self) -> u32 {
        self.invocation_id
    }

    /// Blocks the current thread until the reply arrives.
    pub fn wait(self) -> InvocationResult<Invoke, InvokeError> {
        self.handle.wait()
    }
}

impl Future for PendingInvoke {
    type Output = InvocationResult<Invoke, InvokeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}

/// Cloneable sending side of a session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// Calls `method_name` on the net connection and registers for its reply.
    pub fn invoke(
        &self,
        method_name: impl Into<String>,
        headers: Value,
        arguments: Vec<Value>,
    ) -> RtmpSessionResult<PendingInvoke> {
        self.invoke_on_stream(CONTROL_MESSAGE_STREAM_ID, method_name, headers, arguments)
    }

    pub fn invoke_on_stream(
        &self,
        message_stream_id: u32,
        method_name: impl Into<String>,
        headers: Value,
        arguments: Vec<Value>,
    ) -> RtmpSessionResult<PendingInvoke> {
        // an id still pending after the counter wrapped is skipped
        let (invocation_id, handle) = loop {
            let id = self.shared.next_invocation_id();
            if let Some(handle) = self.shared.pending.try_create(id) {
                break (id, handle);
            }
        };
        let invoke = Invoke::new(method_name, invocation_id, headers, arguments)
            .with_encoding(self.shared.object_encoding);
        tracing::debug!("invoke {}, id: {}", invoke.method_name, invocation_id);

        let sent = self
            .shared
            .enqueue(message_stream_id, None, RtmpMessage::Invoke(invoke));
        if let Err(err) = sent {
            self.shared.pending.remove(&invocation_id);
            return Err(err);
        }
        Ok(PendingInvoke {
            invocation_id,
            handle,
        })
    }

    /// Sends a call that expects no reply, `play` and `publish` for instance.
    pub fn invoke_one_way(
        &self,
        message_stream_id: u32,
        method_name: impl Into<String>,
        headers: Value,
        arguments: Vec<Value>,
    ) -> RtmpSessionResult<()> {
        let invoke = Invoke::new(method_name, ONE_WAY_INVOCATION_ID, headers, arguments)
            .with_encoding(self.shared.object_encoding);
        self.shared
            .enqueue(message_stream_id, None, RtmpMessage::Invoke(invoke))
    }

    pub fn notify(&self, message_stream_id: u32, values: &[Value]) -> RtmpSessionResult<()> {
        let notify = Notify::from_values(self.shared.object_encoding, values)?;
        self.shared
            .enqueue(message_stream_id, None, RtmpMessage::Notify(notify))
    }

    /// Sends `message` on the control stream, stamped with the session clock.
    pub fn send(&self, message: RtmpMessage) -> RtmpSessionResult<()> {
        self.shared.enqueue(CONTROL_MESSAGE_STREAM_ID, None, message)
    }

    pub fn send_to_stream(
        &self,
        message_stream_id: u32,
        timestamp: u32,
        message: RtmpMessage,
    ) -> RtmpSessionResult<()> {
        self.shared.enqueue(message_stream_id, Some(timestamp), message)
    }

    /// Stops waiting for the reply of `invocation_id`, a late reply is dropped.
    pub fn cancel(&self, invocation_id: u32) -> bool {
        self.shared.pending.remove(&invocation_id)
    }

    pub fn pending_invocations(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Fails pending calls, flushes what was already queued and closes the stream.
    pub fn close(&self) {
        self.shared.shutdown("closed by caller");
    }
}

/// A client session over an already handshaken connection.
pub struct RtmpSession {
    handle: SessionHandle,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl RtmpSession {
    /// Spawns the read and write loops, must be called within a tokio runtime.
    pub fn start<S>(io: S, config: RtmpSessionConfig) -> RtmpSessionResult<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        config.validate()?;
        let (read_half, write_half) = tokio::io::split(io);
        let (reader, writer): (BoxedReader, BoxedWriter) = if config.zlib {
            (
                Box::new(AsyncZlibStream::new(read_half, CompressionMode::Decompress)),
                Box::new(AsyncZlibStream::with_level(
                    write_half,
                    CompressionMode::Compress,
                    Compression::new(config.compression_level),
                )),
            )
        } else {
            (Box::new(read_half), Box::new(write_half))
        };

        let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel();
        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(SessionShared {
            outbound: outbound_sender,
            pending: PendingInvocations::new(),
            next_invocation_id: AtomicU32::new(1),
            object_encoding: config.object_encoding,
            cancel: CancellationToken::new(),
            close_reason: Mutex::new(None),
        });

        let write_loop = WriteLoop {
            writer,
            chunk_writer: chunk::writer::Writer::new(),
            buffer: BytesMut::new(),
            started_at: Instant::now(),
            write_timeout: timeout_from_ms(config.write_timeout_ms),
            shared: shared.clone(),
        };
        let read_loop = ReadLoop {
            reader,
            chunk_reader: chunk::reader::Reader::new(),
            buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            read_timeout: timeout_from_ms(config.read_timeout_ms),
            shared: shared.clone(),
            events: event_sender,
            total_received: 0,
            last_acknowledged: 0,
            inbound_window: None,
            outbound_window: config.window_ack_size,
            peer_limit_type: None,
        };

        tokio::spawn(write_loop.run(outbound_receiver, config.clone()));
        tokio::spawn(read_loop.run());
        tracing::info!(
            "rtmp session started, chunk size: {}, zlib: {}",
            config.chunk_size,
            config.zlib
        );

        Ok(Self {
            handle: SessionHandle { shared },
            events: event_receiver,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn into_parts(self) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        (self.handle, self.events)
    }
}

fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then_some(Duration::from_millis(ms))
}

async fn with_timeout<T, F>(
    timeout: Option<Duration>,
    action: &str,
    future: F,
) -> RtmpSessionResult<T>
where
    F: Future<Output = io::Result<T>>,
{
    let Some(duration) = timeout else {
        return Ok(future.await?);
    };
    match tokio::time::timeout(duration, future).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(RtmpSessionError::Timeout(format!(
            "{} timed out after {:?}",
            action, duration
        ))),
    }
}

struct WriteLoop {
    writer: BoxedWriter,
    chunk_writer: chunk::writer::Writer,
    buffer: BytesMut,
    started_at: Instant,
    write_timeout: Option<Duration>,
    shared: Arc<SessionShared>,
}

impl WriteLoop {
    #[instrument(name = "rtmp_write_loop", skip_all)]
    async fn run(
        mut self,
        mut outbound: mpsc::UnboundedReceiver<Outbound>,
        config: RtmpSessionConfig,
    ) {
        match self.process(&mut outbound, &config).await {
            Ok(()) => tracing::debug!("write loop finished"),
            Err(err) => {
                tracing::error!("write loop failed: {:?}", err);
                self.shared.shutdown(&format!("write failed: {}", err));
            }
        }

        // finalizes the zlib trailer when compression is on
        let closed = with_timeout(self.write_timeout, "shutdown", self.writer.shutdown()).await;
        if let Err(err) = closed {
            tracing::warn!("shutdown write half failed: {:?}", err);
        }
    }

    async fn process(
        &mut self,
        outbound: &mut mpsc::UnboundedReceiver<Outbound>,
        config: &RtmpSessionConfig,
    ) -> RtmpSessionResult<()> {
        self.write_message(
            CONTROL_MESSAGE_STREAM_ID,
            None,
            &RtmpMessage::ChunkLength(ChunkLength::new(config.chunk_size as i32)),
        )?;
        self.write_message(
            CONTROL_MESSAGE_STREAM_ID,
            None,
            &RtmpMessage::WindowAcknowledgementSize {
                count: config.window_ack_size as i32,
            },
        )?;
        self.flush().await?;

        while let Some(command) = outbound.recv().await {
            match command {
                Outbound::Message {
                    message_stream_id,
                    timestamp,
                    message,
                    payload,
                } => {
                    if let Err(err) =
                        self.write_encoded(message_stream_id, timestamp, &message, &payload)
                    {
                        tracing::error!("drop unwritable message {:?}: {:?}", message, err);
                        self.fail_invocation(&message, &err);
                        continue;
                    }
                    self.flush().await?;
                }
                Outbound::Close => break,
            }
        }
        Ok(())
    }

    fn write_message(
        &mut self,
        message_stream_id: u32,
        timestamp: Option<u32>,
        message: &RtmpMessage,
    ) -> RtmpSessionResult<()> {
        let timestamp = timestamp.unwrap_or_else(|| self.started_at.elapsed().as_millis() as u32);
        tracing::trace!("write message: {:?}", message);
        self.chunk_writer.write(
            default_csid(message),
            timestamp,
            message_stream_id,
            message,
            &mut self.buffer,
        )?;
        Ok(())
    }

    fn write_encoded(
        &mut self,
        message_stream_id: u32,
        timestamp: Option<u32>,
        message: &RtmpMessage,
        payload: &[u8],
    ) -> RtmpSessionResult<()> {
        let timestamp = timestamp.unwrap_or_else(|| self.started_at.elapsed().as_millis() as u32);
        tracing::trace!("write message: {:?}", message);
        self.chunk_writer.write_encoded(
            default_csid(message),
            timestamp,
            message_stream_id,
            message,
            payload,
            &mut self.buffer,
        )?;
        Ok(())
    }

    fn fail_invocation(&self, message: &RtmpMessage, err: &RtmpSessionError) {
        if let RtmpMessage::Invoke(invoke) = message {
            if invoke.invocation_id != ONE_WAY_INVOCATION_ID {
                self.shared.pending.set_exception(
                    &invoke.invocation_id,
                    InvokeError::ConnectionClosed {
                        reason: format!("invoke not sent: {}", err),
                    },
                );
            }
        }
    }

    async fn flush(&mut self) -> RtmpSessionResult<()> {
        let writer = &mut self.writer;
        let buffer = &self.buffer;
        with_timeout(self.write_timeout, "write", async move {
            writer.write_all(buffer).await?;
            writer.flush().await
        })
        .await?;
        self.buffer.clear();
        Ok(())
    }
}

struct ReadLoop {
    reader: BoxedReader,
    chunk_reader: chunk::reader::Reader,
    buffer: BytesMut,
    read_timeout: Option<Duration>,
    shared: Arc<SessionShared>,
    events: mpsc::UnboundedSender<SessionEvent>,
    total_received: u64,
    last_acknowledged: u64,
    inbound_window: Option<u32>,
    outbound_window: u32,
    peer_limit_type: Option<PeerBandwidthLimitType>,
}

impl ReadLoop {
    #[instrument(name = "rtmp_read_loop", skip_all)]
    async fn run(mut self) {
        let reason = match self.process().await {
            Ok(reason) => reason,
            Err(err) => {
                tracing::error!("read loop failed: {:?}", err);
                err.to_string()
            }
        };
        let reason = self.shared.shutdown(&reason);
        tracing::info!("rtmp session closed: {}", reason);
        let _ = self.events.send(SessionEvent::Closed { reason });
    }

    async fn process(&mut self) -> RtmpSessionResult<String> {
        loop {
            while let Some(message) = self.next_message()? {
                self.dispatch(message)?;
            }
            self.acknowledge_if_needed()?;

            let len = tokio::select! {
                _ = self.shared.cancel.cancelled() => return Ok("session cancelled".to_owned()),
                len = with_timeout(
                    self.read_timeout,
                    "read",
                    self.reader.read_buf(&mut self.buffer),
                ) => len?,
            };
            if len == 0 {
                if !self.buffer.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        format!(
                            "connection reset by peer with {} undecoded bytes",
                            self.buffer.len()
                        ),
                    )
                    .into());
                }
                return Ok("connection closed by peer".to_owned());
            }
            self.total_received += len as u64;
        }
    }

    fn next_message(&mut self) -> RtmpSessionResult<Option<ChunkMessage>> {
        loop {
            match self.chunk_reader.read(&mut self.buffer) {
                Ok(message) => return Ok(message),
                Err(err) if err.is_recoverable() => {
                    tracing::warn!("skip undecodable message: {:?}", err);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn acknowledge_if_needed(&mut self) -> RtmpSessionResult<()> {
        let Some(window) = self.inbound_window else {
            return Ok(());
        };
        if self.total_received - self.last_acknowledged < window as u64 {
            return Ok(());
        }
        self.last_acknowledged = self.total_received;
        let sequence_number = self.total_received as u32;
        tracing::trace!("acknowledge {} bytes", sequence_number);
        self.shared.enqueue(
            CONTROL_MESSAGE_STREAM_ID,
            None,
            RtmpMessage::Acknowledgement { sequence_number },
        )
    }

    fn dispatch(&mut self, message: ChunkMessage) -> RtmpSessionResult<()> {
        let ChunkMessage { header, message } = message;
        match message {
            // applied by the chunk reader
            RtmpMessage::ChunkLength(_) | RtmpMessage::Abort { .. } => {}
            RtmpMessage::Acknowledgement { sequence_number } => {
                tracing::trace!("peer acknowledged {} bytes", sequence_number);
            }
            RtmpMessage::WindowAcknowledgementSize { count } => {
                if count > 0 {
                    tracing::debug!("inbound acknowledgement window set to {}", count);
                    self.inbound_window = Some(count as u32);
                } else {
                    tracing::warn!("ignore invalid acknowledgement window: {}", count);
                }
            }
            RtmpMessage::PeerBandwidth {
                ack_window_size,
                limit_type,
            } => {
                self.on_peer_bandwidth(ack_window_size, limit_type)?;
                self.emit(SessionEvent::PeerBandwidth {
                    ack_window_size,
                    limit_type,
                });
            }
            RtmpMessage::UserControl(message) => {
                if message.event_type == UserControlEventType::PingRequest {
                    if let Some(timestamp) = message.first_value() {
                        tracing::trace!("ping request: {}", timestamp);
                        self.shared.enqueue(
                            CONTROL_MESSAGE_STREAM_ID,
                            None,
                            RtmpMessage::UserControl(UserControlMessage::ping_response(timestamp)),
                        )?;
                    }
                }
                self.emit(SessionEvent::UserControl(message));
            }
            RtmpMessage::Invoke(invoke) => self.on_invoke(header, invoke),
            RtmpMessage::Notify(notify) => self.emit(SessionEvent::Notify { header, notify }),
            RtmpMessage::AudioData { payload } => {
                self.emit(SessionEvent::Audio { header, payload })
            }
            RtmpMessage::VideoData { payload } => {
                self.emit(SessionEvent::Video { header, payload })
            }
        }
        Ok(())
    }

    fn on_invoke(&self, header: ChunkMessageCommonHeader, invoke: Invoke) {
        if !invoke.is_reply() || invoke.invocation_id == ONE_WAY_INVOCATION_ID {
            self.emit(SessionEvent::Invoke { header, invoke });
            return;
        }

        let invocation_id = invoke.invocation_id;
        let completed = match invoke.fault() {
            Some(fault) => self
                .shared
                .pending
                .set_exception(&invocation_id, InvokeError::Fault(fault)),
            None => self.shared.pending.set_result(&invocation_id, invoke),
        };
        if completed {
            tracing::debug!("invocation {} completed", invocation_id);
        } else {
            tracing::debug!("drop unroutable reply, id: {}", invocation_id);
        }
    }

    fn on_peer_bandwidth(
        &mut self,
        ack_window_size: u32,
        limit_type: PeerBandwidthLimitType,
    ) -> RtmpSessionResult<()> {
        let effective = match (limit_type, self.peer_limit_type) {
            (PeerBandwidthLimitType::Dynamic, Some(PeerBandwidthLimitType::Hard)) => {
                PeerBandwidthLimitType::Hard
            }
            (PeerBandwidthLimitType::Dynamic, _) => {
                tracing::debug!("ignore dynamic peer bandwidth without a hard limit in effect");
                return Ok(());
            }
            (limit_type, _) => limit_type,
        };
        let window = match effective {
            PeerBandwidthLimitType::Soft => ack_window_size.min(self.outbound_window),
            _ => ack_window_size,
        };
        self.peer_limit_type = Some(effective);

        if window != self.outbound_window {
            tracing::debug!(
                "outbound window changed from {} to {}",
                self.outbound_window,
                window
            );
            self.outbound_window = window;
            self.shared.enqueue(
                CONTROL_MESSAGE_STREAM_ID,
                None,
                RtmpMessage::WindowAcknowledgementSize {
                    count: window.min(i32::MAX as u32) as i32,
                },
            )?;
        }
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
