// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime};
use std::{io, thread};

use tlgram_crypto::RingBuffer;
use tlgram_mtproto::errors::RequestError;
use tlgram_mtproto::mtp::{self, Deserialization, Mtp};
use tlgram_mtproto::transport::{self, Transport};
use tlgram_mtproto::{authentication, MsgId};
use tlgram_session::UpdatesLike;
use tlgram_tl_types::{self as tl, Deserializable, RemoteCall, Serializable};
use log::{debug, info, trace, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::time::{sleep_until, Instant};

use crate::errors::{AuthorizationError, InvocationError, ReadError, RpcError};
use crate::net::{NetStream, ServerAddr};
use crate::reconnection::ReconnectionPolicy;
use crate::utils::sleep;

/// The maximum data that we're willing to send or receive at once.
///
/// Telegram closes the connection past roughly a megabyte of data, so a
/// few extra kilobytes are reserved on top of that to account for the
/// chosen transport's own framing overhead.
const MAXIMUM_DATA: usize = (1024 * 1024) + (8 * 1024);

/// How much leading space should be reserved in the write buffer so that
/// the transport can prepend its framing without moving memory around.
const LEADING_BUFFER_SPACE: usize = 32;

/// Every how often are pings sent?
const PING_DELAY: Duration = Duration::from_secs(60);

/// After how many seconds should the server close the connection when we send a ping?
const NO_PING_DISCONNECT: i32 = 75;

/// Generate a "random" ping ID.
fn generate_random_id() -> i64 {
    static LAST_ID: AtomicI64 = AtomicI64::new(0);

    while LAST_ID.load(Ordering::SeqCst) == 0 {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("system time is before epoch")
            .as_nanos() as i64;

        if LAST_ID
            .compare_exchange(0, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            thread::yield_now();
        }
    }

    LAST_ID.fetch_add(1, Ordering::SeqCst)
}

/// Manages enqueuing requests, matching them to their response, and IO.
pub struct Sender<T: Transport, M: Mtp> {
    stream: NetStream,
    transport: T,
    mtp: M,
    requests: Vec<Request>,
    next_ping: Instant,

    read_buffer: Vec<u8>,
    read_tail: usize,
    write_buffer: RingBuffer<u8>,
    write_head: usize,
}

struct Request {
    body: Vec<u8>,
    state: RequestState,
    result: oneshot::Sender<Result<Vec<u8>, InvocationError>>,
}

enum RequestState {
    /// Still waiting to be handed to [`Mtp::push`].
    NotSerialized,
    /// Handed off and now waiting for a response carrying this [`MsgId`].
    Sent(MsgId),
}

impl<T: Transport, M: Mtp> Sender<T, M> {
    /// Builds a `Sender` out of an already-connected stream and the given
    /// transport and MTP state, without performing any IO of its own.
    fn from_parts(stream: NetStream, transport: T, mtp: M) -> Self {
        Self {
            stream,
            transport,
            mtp,
            requests: vec![],
            next_ping: Instant::now() + PING_DELAY,

            read_buffer: vec![0; MAXIMUM_DATA],
            read_tail: 0,
            write_buffer: RingBuffer::with_capacity(MAXIMUM_DATA, LEADING_BUFFER_SPACE),
            write_head: 0,
        }
    }

    /// Serializes the given request, enqueues it to the internal buffer, and
    /// repeatedly calls [`Self::step`] until a response for it is received.
    pub async fn invoke<R: RemoteCall>(&mut self, request: &R) -> Result<R::Return, InvocationError> {
        self.invoke_raw(request.to_bytes())
            .await
            .and_then(|body| R::Return::from_bytes(&body).map_err(InvocationError::from))
    }

    /// Like [`Self::invoke`], but for an already-serialized request body
    /// whose response is not meant to be deserialized into a particular
    /// [`RemoteCall::Return`], such as the raw steps of authorization key
    /// generation.
    async fn invoke_raw(&mut self, body: Vec<u8>) -> Result<Vec<u8>, InvocationError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue_body(body, tx);
        self.step_until_receive(rx).await
    }

    /// Enqueues a raw, already-serialized request body. A [`oneshot::Receiver`] paired
    /// with the given `tx` will eventually receive the result once it comes back.
    pub fn enqueue_body(&mut self, body: Vec<u8>, tx: oneshot::Sender<Result<Vec<u8>, InvocationError>>) {
        assert!(body.len() >= 4, "request body must be at least 4 bytes");
        let req_id = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        debug!("enqueueing request {} to be serialized", tl::name_for_id(req_id));

        self.requests.push(Request {
            body,
            state: RequestState::NotSerialized,
            result: tx,
        });
    }

    async fn step_until_receive(
        &mut self,
        mut rx: oneshot::Receiver<Result<Vec<u8>, InvocationError>>,
    ) -> Result<Vec<u8>, InvocationError> {
        loop {
            self.step().await?;
            match rx.try_recv() {
                Ok(x) => break x,
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Closed) => {
                    panic!("request channel dropped before receiving a result")
                }
            }
        }
    }

    /// Step network events, writing and reading at the same time.
    ///
    /// Updates received during this step, if any, are returned. If an error
    /// is returned, the connection should be treated as dead: every pending
    /// request is failed, and the `Sender` should be discarded.
    pub async fn step(&mut self) -> Result<Vec<UpdatesLike>, ReadError> {
        self.try_fill_write();
        let write_len = self.write_buffer.len() - self.write_head;
        trace!("sending up to {} bytes via the network", write_len);

        let (mut reader, mut writer) = self.stream.split();
        let sleep = sleep_until(self.next_ping);

        let res = tokio::select! {
            n = reader.read(&mut self.read_buffer[self.read_tail..]) => {
                n.map_err(ReadError::Io).and_then(|n| self.on_net_read(n))
            }
            n = writer.write(&self.write_buffer.as_ref()[self.write_head..]), if !self.write_buffer.is_empty() => {
                n.map_err(ReadError::Io).map(|n| {
                    self.on_net_write(n);
                    Vec::new()
                })
            }
            _ = sleep => {
                self.on_ping_timeout();
                Ok(Vec::new())
            }
        };

        match res {
            Ok(ok) => Ok(ok),
            Err(err) => {
                self.on_error(&err);
                Err(err)
            }
        }
    }

    /// Hands every not-yet-serialized request to the [`Mtp`] instance, then
    /// packs the result for transmission, unless a write is already pending.
    fn try_fill_write(&mut self) {
        if !self.write_buffer.is_empty() {
            return;
        }

        let mut any_pushed = false;
        for request in self
            .requests
            .iter_mut()
            .filter(|r| matches!(r.state, RequestState::NotSerialized))
        {
            if let Some(msg_id) = self.mtp.push(&request.body) {
                debug!("serialized request with {:?}", msg_id);
                request.state = RequestState::Sent(msg_id);
                any_pushed = true;
            } else {
                break;
            }
        }

        if !any_pushed {
            return;
        }

        let payload = self.mtp.finalize();
        if payload.is_empty() {
            return;
        }

        self.write_buffer.clear();
        self.write_buffer.extend(payload.iter().copied());
        self.transport.pack(&mut self.write_buffer);
    }

    /// Handle `n` more read bytes being ready to process by the transport.
    fn on_net_read(&mut self, n: usize) -> Result<Vec<UpdatesLike>, ReadError> {
        if n == 0 {
            return Err(ReadError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "read 0 bytes",
            )));
        }

        self.read_tail += n;
        trace!("read {} bytes from the network", n);

        let mut updates = Vec::new();
        let mut next_offset = 0;
        while next_offset != self.read_tail {
            match self
                .transport
                .unpack(&mut self.read_buffer[next_offset..self.read_tail])
            {
                Ok(offset) => {
                    let result = self
                        .mtp
                        .deserialize(&self.read_buffer[next_offset + offset.data_start..next_offset + offset.data_end])?;
                    self.process_deserialization(result, &mut updates);
                    next_offset += offset.next_offset;
                }
                Err(transport::Error::MissingBytes) => break,
                Err(err) => return Err(err.into()),
            }
        }

        self.read_buffer.copy_within(next_offset..self.read_tail, 0);
        self.read_tail -= next_offset;

        Ok(updates)
    }

    /// Handle `n` more written bytes being ready to process by the transport.
    fn on_net_write(&mut self, n: usize) {
        self.write_head += n;
        trace!("written {}/{} bytes to the network", self.write_head, self.write_buffer.len());
        assert!(self.write_head <= self.write_buffer.len());
        if self.write_head != self.write_buffer.len() {
            return;
        }

        self.write_buffer.clear();
        self.write_head = 0;
    }

    /// Handle a ping timeout, meaning we need to enqueue a new keepalive ping.
    fn on_ping_timeout(&mut self) {
        let ping_id = generate_random_id();
        debug!("enqueueing keepalive ping {}", ping_id);
        let (tx, _rx) = oneshot::channel();
        self.enqueue_body(
            tl::functions::PingDelayDisconnect {
                ping_id,
                disconnect_delay: NO_PING_DISCONNECT,
            }
            .to_bytes(),
            tx,
        );
        self.next_ping = Instant::now() + PING_DELAY;
    }

    /// Handle errors that occured while performing IO: every pending request fails.
    fn on_error(&mut self, error: &ReadError) {
        warn!("marking all {} request(s) as failed: {}", self.requests.len(), error);
        self.requests
            .drain(..)
            .for_each(|r| drop(r.result.send(Err(InvocationError::from(error.clone())))));
    }

    fn process_deserialization(&mut self, result: Deserialization, updates: &mut Vec<UpdatesLike>) {
        for (msg_id, body) in result.rpc_results {
            self.process_rpc_result(msg_id, body);
        }
        for update in result.updates {
            Self::process_update_bytes(update, updates);
        }
    }

    fn process_rpc_result(&mut self, msg_id: MsgId, body: Result<Vec<u8>, RequestError>) {
        let Some(index) = self.requests.iter().position(|r| matches!(r.state, RequestState::Sent(id) if id == msg_id)) else {
            info!("got a result for {:?} but no such request is saved", msg_id);
            return;
        };

        match body {
            Ok(body) => {
                let req = self.requests.swap_remove(index);
                drop(req.result.send(Ok(body)));
            }
            Err(RequestError::RPCError(rpc_error)) => {
                let caused_by = u32::from_le_bytes(self.requests[index].body[..4].try_into().unwrap());
                let req = self.requests.swap_remove(index);
                drop(req.result.send(Err(InvocationError::Rpc(RpcError::from(rpc_error).with_caused_by(caused_by)))));
            }
            Err(err) => {
                debug!("request {:?} needs to be retransmitted: {:?}", msg_id, err);
                self.requests[index].state = RequestState::NotSerialized;
            }
        }
    }

    fn process_update_bytes(update: Vec<u8>, updates: &mut Vec<UpdatesLike>) {
        if let Ok(u) = tl::enums::Updates::from_bytes(&update) {
            updates.push(UpdatesLike::Updates(u));
            return;
        }
        if let Ok(tl::enums::messages::AffectedMessages::Messages(u)) =
            tl::enums::messages::AffectedMessages::from_bytes(&update)
        {
            updates.push(UpdatesLike::AffectedMessages(u));
            return;
        }
        if let Ok(u) = tl::types::messages::InvitedUsers::from_bytes(&update) {
            updates.push(UpdatesLike::InvitedUsers(u));
            return;
        }
        warn!("telegram sent an unknown or invalid updates-like type for a response");
    }
}

impl<T: Transport> Sender<T, mtp::Encrypted> {
    /// The authorization key currently used to encrypt and decrypt payload.
    pub fn auth_key(&self) -> [u8; 256] {
        self.mtp.auth_key()
    }
}

/// Repeatedly attempts to open a raw network connection to `addr`, honoring
/// `policy` for how long to wait (and whether to give up) between attempts.
///
/// This only retries the connection step itself: by the time it succeeds,
/// the caller's `transport` and `mtp` values are still untouched, ready to
/// be handed to [`Sender::from_parts`].
async fn connect_stream<R: ReconnectionPolicy>(
    addr: &ServerAddr,
    policy: &R,
) -> Result<NetStream, io::Error> {
    let mut attempts = 0;
    loop {
        match NetStream::connect(addr).await {
            Ok(stream) => break Ok(stream),
            Err(err) => {
                if let std::ops::ControlFlow::Continue(delay) = policy.should_retry(attempts) {
                    attempts += 1;
                    sleep(delay).await;
                    continue;
                }
                break Err(err);
            }
        }
    }
}

/// Opens a connection and generates a new authorization key on it.
pub async fn connect<T: Transport, R: ReconnectionPolicy>(
    transport: T,
    addr: ServerAddr,
    policy: &R,
) -> Result<Sender<T, mtp::Encrypted>, AuthorizationError> {
    let stream = connect_stream(&addr, policy).await?;
    let sender = Sender::from_parts(stream, transport, mtp::Plain::new());
    generate_auth_key(sender).await
}

/// Opens a connection reusing a previously generated authorization key,
/// skipping the Diffie-Hellman key exchange entirely.
pub async fn connect_with_auth<T: Transport, R: ReconnectionPolicy>(
    transport: T,
    addr: ServerAddr,
    auth_key: [u8; 256],
    policy: &R,
) -> Result<Sender<T, mtp::Encrypted>, AuthorizationError> {
    let stream = connect_stream(&addr, policy).await?;
    let mtp = mtp::Encrypted::build().finish(auth_key);
    Ok(Sender::from_parts(stream, transport, mtp))
}

/// Uses a freshly-connected plain sender to carry out the Authorization Key
/// generation process, and returns an encrypted sender reusing the same
/// underlying connection and transport.
pub async fn generate_auth_key<T: Transport>(
    mut sender: Sender<T, mtp::Plain>,
) -> Result<Sender<T, mtp::Encrypted>, AuthorizationError> {
    info!("generating new authorization key...");
    let (request, data) = authentication::step1()?;
    let response = sender.invoke_raw(request).await?;
    let (request, data) = authentication::step2(data, &response)?;
    let response = sender.invoke_raw(request).await?;
    let (request, data) = authentication::step3(data, &response)?;
    let response = sender.invoke_raw(request).await?;
    let authentication::Finished {
        auth_key,
        time_offset,
        first_salt,
    } = authentication::create_key(data, &response)?;
    info!("authorization key generated successfully");

    Ok(Sender {
        stream: sender.stream,
        transport: sender.transport,
        mtp: mtp::Encrypted::build()
            .time_offset(time_offset)
            .first_salt(first_salt)
            .finish(auth_key),
        requests: sender.requests,
        next_ping: Instant::now() + PING_DELAY,
        read_buffer: sender.read_buffer,
        read_tail: sender.read_tail,
        write_buffer: sender.write_buffer,
        write_head: sender.write_head,
    })
}
