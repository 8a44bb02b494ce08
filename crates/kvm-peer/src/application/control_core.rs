//! ControlCore: the state machine that owns where keyboard/mouse input goes
//! (§4.7). Every instance runs the identical daemon, so this state machine
//! is bidirectional: a host is `Idle`, `Controlling` a peer (local input
//! routed out, physical cursor anchored and hidden), or `Controlled` by one
//! (incoming input synthesized locally).
//!
//! # Concurrency
//!
//! [`ControlCore::dispatch`] (the [`InputDispatch`] impl) is called directly
//! from the OS hook thread and must answer its suppress decision without
//! blocking on I/O, so all control state here lives behind `std::sync::Mutex`
//! rather than an async lock. Outbound protocol messages are never sent
//! inline — they're handed to an unbounded channel and written by
//! [`spawn_outbound_pump`], which is the only place that calls
//! [`Connection::send`]. The peer registry uses a plain `std::sync::RwLock`
//! for the same reason: the hook thread and the clipboard-change callback
//! both read it synchronously and must never await.

use std::sync::{Arc, Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant};

use kvm_core::domain::control_state::ControlState;
use kvm_core::domain::geometry::{edge_at, Edge, Rect};
use kvm_core::domain::peer::{MachineId, Position};
use kvm_core::protocol::messages::{
    ClipboardMessage, CursorEnterMessage, CursorLeaveMessage, KeyEventType, KeyboardMessage,
    KvmMessage, MouseEventType, MouseMessage, WireEdge,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::infrastructure::capture::{InputDispatch, MouseButton, RawInputEvent};
use crate::infrastructure::clipboard::{Clipboard, ClipboardContent};
use crate::infrastructure::emulation::EmulationService;
use crate::infrastructure::network::connection::Connection;
use crate::infrastructure::network::peer_registry::{LinkState, PeerRegistry};
use crate::infrastructure::screen::ScreenMetrics;

/// Return-cooldown after `EndRemoteControl`, preventing immediate re-entry
/// at the same edge (§4.7.2 step 1).
const RETURN_COOLDOWN: Duration = Duration::from_millis(500);
/// Warp-guard margin subtracted from half the screen dimension (§4.6).
const WARP_GUARD_PX: i32 = 10;
/// Fraction of the remote screen's entry-axis dimension the cursor must
/// travel before a return-to-edge exit is armed (§4.7.2 step 6).
const MOVED_IN_FRACTION: f32 = 0.05;
/// Exponential-moving-average weight given to the previous velocity sample.
const VELOCITY_ALPHA: f32 = 0.7;
/// Upper bound (exclusive) on the inter-event gap still counted as
/// continuous motion for the velocity EMA (§4.7.2 step 4).
const VELOCITY_GAP_MAX_MS: u64 = 1000;
/// Velocity-send throttle: resend once either axis has moved this many
/// px/s since the last send, or the interval below has elapsed.
const VELOCITY_SEND_DELTA: f32 = 50.0;
const VELOCITY_SEND_INTERVAL_MS: u64 = 100;

/// A protocol message queued for one peer, drained by
/// [`spawn_outbound_pump`].
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub peer_id: MachineId,
    pub message: KvmMessage,
}

/// Per-episode bookkeeping while `Controlling(peer)`, live only between
/// entry and `EndRemoteControl`.
struct ControllingEpisode {
    peer_id: MachineId,
    peer_position: Position,
    remote_bounds: Rect,
    /// The edge of the remote screen the cursor entered (and must cross
    /// back out of to return control) — always `opposite(peer_position)`.
    entry_edge: Edge,
    entry_point: (i32, i32),
    /// Unclamped accumulator used to detect the return-edge crossing;
    /// `remote_bounds.clamp(..)` is applied only when building the outgoing
    /// `Mouse` message, never fed back into this field.
    remote_raw: (i32, i32),
    moved_in: bool,
    last_seen: (i32, i32),
    velocity: (f32, f32),
    last_velocity_sent: (f32, f32),
    last_velocity_sent_at: Instant,
    last_event_at: Instant,
}

/// Owns the control state, the virtual cursor, and every platform
/// capability needed to run §4.7's algorithm end to end.
pub struct ControlCore {
    state: Mutex<ControlState>,
    episode: Mutex<Option<ControllingEpisode>>,
    cooldown_until: Mutex<Option<Instant>>,
    screen: Arc<dyn ScreenMetrics>,
    emulation: Arc<EmulationService>,
    clipboard: Arc<dyn Clipboard>,
    clipboard_enabled: bool,
    registry: Arc<StdRwLock<PeerRegistry>>,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    state_events: broadcast::Sender<ControlState>,
    edge_threshold: i32,
}

impl ControlCore {
    /// Builds a core and wires its clipboard change subscription. Returns
    /// the core (always behind `Arc`, since capability callbacks need a
    /// `'static` handle) plus the receiver end of the outbound channel —
    /// pass that to [`spawn_outbound_pump`].
    pub fn new(
        screen: Arc<dyn ScreenMetrics>,
        emulation: Arc<EmulationService>,
        clipboard: Arc<dyn Clipboard>,
        clipboard_enabled: bool,
        registry: Arc<StdRwLock<PeerRegistry>>,
        edge_threshold: i32,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = broadcast::channel(16);

        let core = Arc::new(Self {
            state: Mutex::new(ControlState::Idle),
            episode: Mutex::new(None),
            cooldown_until: Mutex::new(None),
            screen,
            emulation,
            clipboard: Arc::clone(&clipboard),
            clipboard_enabled,
            registry,
            outbound: outbound_tx,
            state_events: state_tx,
            edge_threshold,
        });

        let watcher = Arc::clone(&core);
        clipboard.subscribe_change(Arc::new(move |content| {
            watcher.on_local_clipboard_change(content);
        }));

        (core, outbound_rx)
    }

    pub fn current_state(&self) -> ControlState {
        self.state.lock().expect("lock poisoned").clone()
    }

    pub fn subscribe_state_changes(&self) -> broadcast::Receiver<ControlState> {
        self.state_events.subscribe()
    }

    /// Dispatches a decoded application-layer message from `peer_id`
    /// (§4.7.5). `Handshake`/`HandshakeAck`/`Ping`/`Pong`/`Disconnect`/
    /// `ClipboardRequest`/`Error` never reach here — they're handled at the
    /// connection layer or the daemon orchestrator.
    pub fn handle_remote_message(&self, peer_id: &MachineId, message: KvmMessage) {
        match message {
            KvmMessage::Mouse(m) => self.on_remote_mouse(peer_id, m),
            KvmMessage::Keyboard(k) => self.on_remote_keyboard(peer_id, k),
            KvmMessage::CursorEnter(c) => self.on_remote_cursor_enter(peer_id, c),
            KvmMessage::CursorLeave(c) => self.on_remote_cursor_leave(peer_id, c),
            KvmMessage::Clipboard(c) => self.on_remote_clipboard(c),
            other => debug!(
                "ignoring {:?} from {peer_id} at the control core",
                other.message_type()
            ),
        }
    }

    /// Forces a return to `Idle`, used when a peer disconnects out from
    /// under an active episode.
    pub fn handle_peer_disconnected(&self, peer_id: &MachineId) {
        let controlling = self.state.lock().expect("lock poisoned").controlling_peer() == Some(peer_id);
        let controlled = self.state.lock().expect("lock poisoned").controlled_by_peer() == Some(peer_id);
        if controlling {
            let _ = self.emulation.show_cursor();
            *self.episode.lock().expect("lock poisoned") = None;
            *self.state.lock().expect("lock poisoned") = ControlState::Idle;
            let _ = self.state_events.send(ControlState::Idle);
        } else if controlled {
            *self.state.lock().expect("lock poisoned") = ControlState::Idle;
            let _ = self.state_events.send(ControlState::Idle);
        }
    }

    /// Forces `Idle`, used when the daemon is disabled (§4.7.1 invariant).
    pub fn force_idle(&self) {
        if self.state.lock().expect("lock poisoned").controlling_peer().is_some() {
            self.end_remote_control(0.5);
        } else {
            *self.episode.lock().expect("lock poisoned") = None;
            *self.state.lock().expect("lock poisoned") = ControlState::Idle;
            let _ = self.state_events.send(ControlState::Idle);
        }
    }

    fn enqueue(&self, peer_id: &MachineId, message: KvmMessage) {
        let envelope = OutboundMessage {
            peer_id: peer_id.clone(),
            message,
        };
        if self.outbound.send(envelope).is_err() {
            warn!("outbound queue is gone; dropping message to {peer_id}");
        }
    }

    // ---- local mouse -------------------------------------------------

    fn on_local_mouse_move(&self, x: i32, y: i32) -> bool {
        let state = self.state.lock().expect("lock poisoned").clone();
        match state {
            ControlState::Idle => self.try_enter_controlling(x, y),
            ControlState::Controlling(_) => {
                let release = {
                    let mut guard = self.episode.lock().expect("lock poisoned");
                    match guard.as_mut() {
                        Some(episode) => self.advance_episode(episode, x, y),
                        None => return true,
                    }
                };
                if let Some(release_normalized) = release {
                    self.end_remote_control(release_normalized);
                }
                true
            }
            ControlState::Controlled(_) => true,
        }
    }

    fn on_local_mouse_button(&self, button: MouseButton, down: bool) -> bool {
        let state = self.state.lock().expect("lock poisoned").clone();
        match state {
            ControlState::Controlling(peer_id) => {
                let event_type = button_event_type(button, down);
                self.send_current_position(&peer_id, event_type, 0);
                true
            }
            ControlState::Controlled(_) => true,
            ControlState::Idle => false,
        }
    }

    fn on_local_mouse_wheel(&self, delta: i32, horizontal: bool) -> bool {
        let state = self.state.lock().expect("lock poisoned").clone();
        match state {
            ControlState::Controlling(peer_id) => {
                let event_type = if horizontal {
                    MouseEventType::HWheel
                } else {
                    MouseEventType::Wheel
                };
                self.send_current_position(&peer_id, event_type, delta);
                true
            }
            ControlState::Controlled(_) => true,
            ControlState::Idle => false,
        }
    }

    fn send_current_position(&self, peer_id: &MachineId, event_type: MouseEventType, wheel_delta: i32) {
        let guard = self.episode.lock().expect("lock poisoned");
        if let Some(episode) = guard.as_ref() {
            let (x, y) = episode.remote_bounds.clamp(episode.remote_raw.0, episode.remote_raw.1);
            drop(guard);
            self.enqueue(
                peer_id,
                KvmMessage::Mouse(MouseMessage {
                    x,
                    y,
                    event_type,
                    wheel_delta,
                    velocity: None,
                }),
            );
        }
    }

    fn try_enter_controlling(&self, x: i32, y: i32) -> bool {
        if let Some(until) = *self.cooldown_until.lock().expect("lock poisoned") {
            if Instant::now() < until {
                return false;
            }
        }

        let local_bounds = match self.screen.primary_bounds() {
            Ok(b) => b,
            Err(_) => return false,
        };
        let hit = match edge_at(&local_bounds, x, y, self.edge_threshold) {
            Some(h) => h,
            None => return false,
        };
        let position = edge_to_position(hit.edge);

        let (peer_id, remote_w, remote_h) = {
            let registry = self.registry.read().expect("lock poisoned");
            let entry = registry
                .all()
                .find(|e| e.record.position == Some(position) && e.link_state == LinkState::Connected);
            match entry {
                Some(e) => match (e.record.remote_screen_width, e.record.remote_screen_height) {
                    (Some(w), Some(h)) => (e.record.id.clone(), w, h),
                    _ => return false,
                },
                None => return false,
            }
        };

        let remote_bounds = Rect::new(remote_w, remote_h);
        let entry_edge = position.local_edge().opposite();
        let entry_point = point_on_edge(&remote_bounds, entry_edge, hit.normalized_pos);
        let anchor = (local_bounds.width / 2, local_bounds.height / 2);

        let _ = self.emulation.hide_cursor();
        let _ = self.emulation.move_cursor_absolute(anchor.0, anchor.1);

        *self.episode.lock().expect("lock poisoned") = Some(ControllingEpisode {
            peer_id: peer_id.clone(),
            peer_position: position,
            remote_bounds,
            entry_edge,
            entry_point,
            remote_raw: entry_point,
            moved_in: false,
            last_seen: anchor,
            velocity: (0.0, 0.0),
            last_velocity_sent: (0.0, 0.0),
            last_velocity_sent_at: Instant::now(),
            last_event_at: Instant::now(),
        });
        *self.state.lock().expect("lock poisoned") = ControlState::Controlling(peer_id.clone());

        let (nx, ny) = fractional_position(&remote_bounds, entry_point);
        self.enqueue(
            &peer_id,
            KvmMessage::CursorEnter(CursorEnterMessage {
                x: nx,
                y: ny,
                edge: domain_edge_to_wire(entry_edge),
            }),
        );

        let _ = self.state_events.send(ControlState::Controlling(peer_id));
        true
    }

    /// Advances an active episode by one physical move. Returns
    /// `Some(releaseNormalized)` when the cursor has crossed back out the
    /// entry edge and control should end.
    fn advance_episode(&self, episode: &mut ControllingEpisode, x: i32, y: i32) -> Option<f32> {
        let dx = x - episode.last_seen.0;
        let dy = y - episode.last_seen.1;
        episode.last_seen = (x, y);
        if dx == 0 && dy == 0 {
            return None;
        }

        let local_bounds = self.screen.primary_bounds().ok()?;
        let guard_x = (local_bounds.width / 2 - WARP_GUARD_PX).max(0);
        let guard_y = (local_bounds.height / 2 - WARP_GUARD_PX).max(0);
        if dx.abs() > guard_x || dy.abs() > guard_y {
            return None;
        }

        let now = Instant::now();
        let gap = now.saturating_duration_since(episode.last_event_at);
        episode.last_event_at = now;
        if gap > Duration::ZERO && gap < Duration::from_millis(VELOCITY_GAP_MAX_MS) {
            let dt = gap.as_secs_f32();
            let sample = (dx as f32 / dt, dy as f32 / dt);
            episode.velocity = (
                VELOCITY_ALPHA * episode.velocity.0 + (1.0 - VELOCITY_ALPHA) * sample.0,
                VELOCITY_ALPHA * episode.velocity.1 + (1.0 - VELOCITY_ALPHA) * sample.1,
            );
        } else {
            episode.velocity = (0.0, 0.0);
        }

        episode.remote_raw.0 += dx;
        episode.remote_raw.1 += dy;

        if !episode.moved_in {
            let (travelled, dimension) = match episode.entry_edge {
                Edge::Left | Edge::Right => (
                    (episode.remote_raw.0 - episode.entry_point.0).unsigned_abs(),
                    episode.remote_bounds.width,
                ),
                Edge::Top | Edge::Bottom => (
                    (episode.remote_raw.1 - episode.entry_point.1).unsigned_abs(),
                    episode.remote_bounds.height,
                ),
            };
            if travelled as f32 >= MOVED_IN_FRACTION * dimension as f32 {
                episode.moved_in = true;
            }
        }

        if episode.moved_in {
            let exited = match episode.entry_edge {
                Edge::Left => episode.remote_raw.0 < 0,
                Edge::Right => episode.remote_raw.0 > episode.remote_bounds.width - 1,
                Edge::Top => episode.remote_raw.1 < 0,
                Edge::Bottom => episode.remote_raw.1 > episode.remote_bounds.height - 1,
            };
            if exited {
                let release_normalized = match episode.entry_edge {
                    Edge::Left | Edge::Right => (episode.remote_raw.1 as f32
                        / (episode.remote_bounds.height - 1).max(1) as f32)
                        .clamp(0.0, 1.0),
                    Edge::Top | Edge::Bottom => (episode.remote_raw.0 as f32
                        / (episode.remote_bounds.width - 1).max(1) as f32)
                        .clamp(0.0, 1.0),
                };
                return Some(release_normalized);
            }
        }

        let (cx, cy) = episode.remote_bounds.clamp(episode.remote_raw.0, episode.remote_raw.1);
        let send_velocity = {
            let dv0 = (episode.velocity.0 - episode.last_velocity_sent.0).abs();
            let dv1 = (episode.velocity.1 - episode.last_velocity_sent.1).abs();
            dv0 >= VELOCITY_SEND_DELTA
                || dv1 >= VELOCITY_SEND_DELTA
                || now.saturating_duration_since(episode.last_velocity_sent_at)
                    >= Duration::from_millis(VELOCITY_SEND_INTERVAL_MS)
        };
        let velocity = if send_velocity {
            episode.last_velocity_sent = episode.velocity;
            episode.last_velocity_sent_at = now;
            Some(episode.velocity)
        } else {
            None
        };

        self.enqueue(
            &episode.peer_id,
            KvmMessage::Mouse(MouseMessage {
                x: cx,
                y: cy,
                event_type: MouseEventType::Move,
                wheel_delta: 0,
                velocity,
            }),
        );

        None
    }

    fn end_remote_control(&self, release_normalized: f32) {
        let peer_id = match self.state.lock().expect("lock poisoned").controlling_peer() {
            Some(id) => id.clone(),
            None => return,
        };
        let episode = self.episode.lock().expect("lock poisoned").take();

        let _ = self.emulation.show_cursor();

        if let Some(episode) = episode {
            if let Ok(local_bounds) = self.screen.primary_bounds() {
                let release_edge = episode.peer_position.local_edge();
                let (rx, ry) = point_on_edge(&local_bounds, release_edge, release_normalized);
                let _ = self.emulation.move_cursor_absolute(rx, ry);
            }
            self.enqueue(
                &peer_id,
                KvmMessage::CursorLeave(CursorLeaveMessage {
                    x: 0.5,
                    y: 0.5,
                    edge: domain_edge_to_wire(episode.entry_edge),
                }),
            );
        }

        *self.cooldown_until.lock().expect("lock poisoned") = Some(Instant::now() + RETURN_COOLDOWN);
        *self.state.lock().expect("lock poisoned") = ControlState::Idle;
        let _ = self.state_events.send(ControlState::Idle);
    }

    // ---- local keyboard ------------------------------------------------

    fn on_local_keyboard(&self, message: KeyboardMessage) -> bool {
        let state = self.state.lock().expect("lock poisoned").clone();
        match state {
            ControlState::Controlling(peer_id) => {
                self.enqueue(&peer_id, KvmMessage::Keyboard(message));
                true
            }
            ControlState::Controlled(_) => true,
            ControlState::Idle => false,
        }
    }

    // ---- remote dispatch ------------------------------------------------

    fn on_remote_mouse(&self, peer_id: &MachineId, m: MouseMessage) {
        if self.state.lock().expect("lock poisoned").controlled_by_peer() != Some(peer_id) {
            return;
        }
        let bounds = match self.screen.primary_bounds() {
            Ok(b) => b,
            Err(_) => return,
        };
        let (x, y) = bounds.clamp(m.x, m.y);
        if let Err(e) = self.emulation.handle_mouse(&MouseMessage {
            x,
            y,
            event_type: MouseEventType::Move,
            wheel_delta: 0,
            velocity: None,
        }) {
            warn!("failed to synthesize remote mouse move: {e}");
        }
        if m.event_type != MouseEventType::Move {
            if let Err(e) = self.emulation.handle_mouse(&MouseMessage {
                x,
                y,
                event_type: m.event_type,
                wheel_delta: m.wheel_delta,
                velocity: None,
            }) {
                warn!("failed to synthesize remote mouse event: {e}");
            }
        }
    }

    fn on_remote_keyboard(&self, peer_id: &MachineId, k: KeyboardMessage) {
        if self.state.lock().expect("lock poisoned").controlled_by_peer() != Some(peer_id) {
            return;
        }
        if let Err(e) = self.emulation.handle_keyboard(&k) {
            warn!("failed to synthesize remote keyboard event: {e}");
        }
    }

    fn on_remote_cursor_enter(&self, peer_id: &MachineId, msg: CursorEnterMessage) {
        if !self.state.lock().expect("lock poisoned").is_idle() {
            warn!("ignoring CursorEnter from {peer_id}: not idle");
            return;
        }
        let edge = wire_edge_to_domain(msg.edge);
        if let Ok(local_bounds) = self.screen.primary_bounds() {
            let normalized = match edge {
                Edge::Left | Edge::Right => msg.y,
                Edge::Top | Edge::Bottom => msg.x,
            };
            let (x, y) = point_on_edge(&local_bounds, edge, normalized);
            let _ = self.emulation.move_cursor_absolute(x, y);
        }
        *self.state.lock().expect("lock poisoned") = ControlState::Controlled(peer_id.clone());
        let _ = self.state_events.send(ControlState::Controlled(peer_id.clone()));
    }

    fn on_remote_cursor_leave(&self, peer_id: &MachineId, _msg: CursorLeaveMessage) {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.controlled_by_peer() == Some(peer_id) {
            *state = ControlState::Idle;
            drop(state);
            let _ = self.state_events.send(ControlState::Idle);
        }
    }

    fn on_remote_clipboard(&self, msg: ClipboardMessage) {
        if !self.clipboard_enabled {
            return;
        }
        let content = ClipboardContent {
            content_type: msg.content_type,
            format_hint: msg.format_hint,
            data: msg.data,
        };
        if let Err(e) = self.clipboard.write_content(content) {
            warn!("dropped incoming clipboard update: {e}");
        }
    }

    // ---- clipboard fan-out ----------------------------------------------

    fn on_local_clipboard_change(&self, content: ClipboardContent) {
        if !self.clipboard_enabled {
            return;
        }
        let message = KvmMessage::Clipboard(ClipboardMessage {
            content_type: content.content_type,
            format_hint: content.format_hint,
            data: content.data,
        });
        let peer_ids: Vec<MachineId> = {
            let registry = self.registry.read().expect("lock poisoned");
            registry.connected_peers().map(|e| e.record.id.clone()).collect()
        };
        for peer_id in peer_ids {
            self.enqueue(&peer_id, message.clone());
        }
    }
}

impl InputDispatch for ControlCore {
    fn dispatch(&self, event: RawInputEvent) -> bool {
        match event {
            RawInputEvent::MouseMove { x, y } => self.on_local_mouse_move(x, y),
            RawInputEvent::MouseButtonDown { button, .. } => self.on_local_mouse_button(button, true),
            RawInputEvent::MouseButtonUp { button, .. } => self.on_local_mouse_button(button, false),
            RawInputEvent::MouseWheel { delta, .. } => self.on_local_mouse_wheel(delta, false),
            RawInputEvent::MouseWheelH { delta, .. } => self.on_local_mouse_wheel(delta, true),
            RawInputEvent::KeyDown {
                vk_code,
                scan_code,
                is_extended,
            } => self.on_local_keyboard(KeyboardMessage {
                key_code: vk_code as i32,
                scan_code,
                event_type: KeyEventType::Down,
                is_extended,
            }),
            RawInputEvent::KeyUp {
                vk_code,
                scan_code,
                is_extended,
            } => self.on_local_keyboard(KeyboardMessage {
                key_code: vk_code as i32,
                scan_code,
                event_type: KeyEventType::Up,
                is_extended,
            }),
        }
    }
}

/// Spawns the task that drains [`OutboundMessage`]s and writes them to the
/// matching connection. The only place in the daemon that calls
/// [`Connection::send`] on the control core's behalf.
pub fn spawn_outbound_pump(
    registry: Arc<StdRwLock<PeerRegistry>>,
    mut receiver: mpsc::UnboundedReceiver<OutboundMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = receiver.recv().await {
            let connection = registry
                .read()
                .expect("lock poisoned")
                .get(&envelope.peer_id)
                .and_then(|e| e.connection.clone());
            let Some(connection) = connection else {
                continue;
            };
            if let Err(e) = connection.send(&envelope.message).await {
                warn!(
                    "failed to send {:?} to {}: {e}",
                    envelope.message.message_type(),
                    envelope.peer_id
                );
            }
        }
    })
}

fn button_event_type(button: MouseButton, down: bool) -> MouseEventType {
    match (button, down) {
        (MouseButton::Left, true) => MouseEventType::LeftDown,
        (MouseButton::Left, false) => MouseEventType::LeftUp,
        (MouseButton::Right, true) => MouseEventType::RightDown,
        (MouseButton::Right, false) => MouseEventType::RightUp,
        (MouseButton::Middle, true) => MouseEventType::MiddleDown,
        (MouseButton::Middle, false) => MouseEventType::MiddleUp,
        (MouseButton::X1, true) => MouseEventType::XButton1Down,
        (MouseButton::X1, false) => MouseEventType::XButton1Up,
        (MouseButton::X2, true) => MouseEventType::XButton2Down,
        (MouseButton::X2, false) => MouseEventType::XButton2Up,
    }
}

fn edge_to_position(edge: Edge) -> Position {
    match edge {
        Edge::Left => Position::Left,
        Edge::Right => Position::Right,
        Edge::Top => Position::Top,
        Edge::Bottom => Position::Bottom,
    }
}

fn domain_edge_to_wire(edge: Edge) -> WireEdge {
    match edge {
        Edge::Left => WireEdge::Left,
        Edge::Right => WireEdge::Right,
        Edge::Top => WireEdge::Top,
        Edge::Bottom => WireEdge::Bottom,
    }
}

fn wire_edge_to_domain(edge: WireEdge) -> Edge {
    match edge {
        WireEdge::Left => Edge::Left,
        WireEdge::Right => Edge::Right,
        WireEdge::Top => Edge::Top,
        WireEdge::Bottom => Edge::Bottom,
    }
}

/// The pixel point on `edge` of `bounds` at fraction `normalized` along the
/// edge's own axis (§4.7.2's entry table and §4.6's release placement).
fn point_on_edge(bounds: &Rect, edge: Edge, normalized: f32) -> (i32, i32) {
    let nx = (normalized * bounds.width as f32).round() as i32;
    let ny = (normalized * bounds.height as f32).round() as i32;
    let (x, y) = match edge {
        Edge::Left => (0, ny),
        Edge::Right => (bounds.width - 1, ny),
        Edge::Top => (nx, 0),
        Edge::Bottom => (nx, bounds.height - 1),
    };
    bounds.clamp(x, y)
}

/// Inverse of the scaling half of [`point_on_edge`]: a pixel point expressed
/// as fractions of `bounds`, for the `CursorEnter` wire message.
fn fractional_position(bounds: &Rect, point: (i32, i32)) -> (f32, f32) {
    let w = (bounds.width - 1).max(1) as f32;
    let h = (bounds.height - 1).max(1) as f32;
    (point.0 as f32 / w, point.1 as f32 / h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clipboard::mock::MockClipboard;
    use crate::infrastructure::emulation::mock::MockSynthesizer;
    use crate::infrastructure::screen::mock::MockScreenMetrics;
    use kvm_core::domain::peer::PeerRecord;

    const EDGE_THRESHOLD: i32 = 2;

    fn make_core() -> (
        Arc<ControlCore>,
        mpsc::UnboundedReceiver<OutboundMessage>,
        Arc<MockSynthesizer>,
        Arc<StdRwLock<PeerRegistry>>,
    ) {
        let screen = Arc::new(MockScreenMetrics::single_1080p());
        let synth = Arc::new(MockSynthesizer::new());
        let emulation = Arc::new(EmulationService::new(Arc::clone(&synth) as Arc<_>));
        let clipboard = Arc::new(MockClipboard::default());
        let registry = Arc::new(StdRwLock::new(PeerRegistry::new()));

        let (core, rx) = ControlCore::new(
            screen,
            emulation,
            clipboard,
            true,
            Arc::clone(&registry),
            EDGE_THRESHOLD,
        );
        (core, rx, synth, registry)
    }

    fn register_connected_peer(registry: &StdRwLock<PeerRegistry>, id: &str, position: Position) {
        let mut record = PeerRecord::from_config(
            id.repeat(32),
            format!("peer-{id}"),
            "127.0.0.1".into(),
            24800,
            position,
            0,
            0,
        );
        record.record_handshake(1920, 1080);
        let mut guard = registry.write().unwrap();
        guard.register(record);
        guard.set_link_state(&id.repeat(32), LinkState::Connected);
    }

    #[test]
    fn idle_local_move_away_from_any_edge_is_not_suppressed() {
        let (core, _rx, _synth, _registry) = make_core();
        assert!(!core.dispatch(RawInputEvent::MouseMove { x: 960, y: 540 }));
        assert!(core.current_state().is_idle());
    }

    #[test]
    fn entering_at_a_configured_edge_transitions_to_controlling_and_hides_cursor() {
        let (core, mut rx, synth, registry) = make_core();
        register_connected_peer(&registry, "a", Position::Right);

        let suppressed = core.dispatch(RawInputEvent::MouseMove { x: 1919, y: 540 });
        assert!(suppressed);
        assert_eq!(core.current_state(), ControlState::Controlling("a".repeat(32)));
        assert!(*synth.cursor_hidden.lock().unwrap());

        let envelope = rx.try_recv().expect("CursorEnter should have been queued");
        assert_eq!(envelope.peer_id, "a".repeat(32));
        assert!(matches!(envelope.message, KvmMessage::CursorEnter(_)));
    }

    #[test]
    fn entry_is_rejected_when_no_peer_is_configured_at_the_edge() {
        let (core, _rx, _synth, _registry) = make_core();
        assert!(!core.dispatch(RawInputEvent::MouseMove { x: 1919, y: 540 }));
    }

    #[test]
    fn entry_is_rejected_when_the_peer_has_no_completed_handshake() {
        let (core, _rx, _synth, registry) = make_core();
        let record = PeerRecord::from_config(
            "b".repeat(32),
            "peer-b".into(),
            "127.0.0.1".into(),
            24800,
            Position::Right,
            0,
            0,
        );
        let mut guard = registry.write().unwrap();
        guard.register(record);
        guard.set_link_state(&"b".repeat(32), LinkState::Connected);
        drop(guard);

        assert!(!core.dispatch(RawInputEvent::MouseMove { x: 1919, y: 540 }));
    }

    #[test]
    fn a_warp_sized_delta_is_dropped_without_moving_the_virtual_cursor() {
        let (core, mut rx, _synth, registry) = make_core();
        register_connected_peer(&registry, "a", Position::Right);
        core.dispatch(RawInputEvent::MouseMove { x: 1919, y: 540 });
        let _ = rx.try_recv();

        // anchor is (960, 540); a jump most of the way across the screen
        // must be treated as the warp's own synthetic echo.
        let suppressed = core.dispatch(RawInputEvent::MouseMove { x: 10, y: 540 });
        assert!(suppressed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn small_moves_accumulate_and_are_forwarded_as_mouse_messages() {
        let (core, mut rx, _synth, registry) = make_core();
        register_connected_peer(&registry, "a", Position::Right);
        core.dispatch(RawInputEvent::MouseMove { x: 1919, y: 540 });
        let _ = rx.try_recv();

        core.dispatch(RawInputEvent::MouseMove { x: 965, y: 540 });
        let envelope = rx.try_recv().expect("a Mouse move should have been queued");
        match envelope.message {
            KvmMessage::Mouse(m) => {
                assert_eq!(m.event_type, MouseEventType::Move);
                assert_eq!(m.x, 5);
            }
            other => panic!("expected Mouse, got {other:?}"),
        }
    }

    #[test]
    fn moving_back_out_the_entry_edge_ends_control_and_restores_the_cursor() {
        let (core, mut rx, synth, registry) = make_core();
        register_connected_peer(&registry, "a", Position::Right);
        core.dispatch(RawInputEvent::MouseMove { x: 1919, y: 540 });
        let _ = rx.try_recv();

        // Cross the moved-in deadband (5% of 1920 = 96px) deep into the
        // remote screen, then walk all the way back out through x = 0.
        core.dispatch(RawInputEvent::MouseMove { x: 1060, y: 540 });
        let _ = rx.try_recv();
        core.dispatch(RawInputEvent::MouseMove { x: 962, y: 540 });
        let _ = rx.try_recv();

        assert!(core.current_state().is_idle());
        assert!(!*synth.cursor_hidden.lock().unwrap());
        let envelope = rx.try_recv().expect("CursorLeave should have been queued");
        assert!(matches!(envelope.message, KvmMessage::CursorLeave(_)));
    }

    #[test]
    fn keyboard_while_controlling_is_forwarded_and_suppressed() {
        let (core, mut rx, _synth, registry) = make_core();
        register_connected_peer(&registry, "a", Position::Right);
        core.dispatch(RawInputEvent::MouseMove { x: 1919, y: 540 });
        let _ = rx.try_recv();

        let suppressed = core.dispatch(RawInputEvent::KeyDown {
            vk_code: 0x41,
            scan_code: 0x1E,
            is_extended: false,
        });
        assert!(suppressed);
        let envelope = rx.try_recv().expect("Keyboard message should have been queued");
        assert!(matches!(envelope.message, KvmMessage::Keyboard(_)));
    }

    #[test]
    fn keyboard_while_idle_passes_through() {
        let (core, _rx, _synth, _registry) = make_core();
        assert!(!core.dispatch(RawInputEvent::KeyDown {
            vk_code: 0x41,
            scan_code: 0x1E,
            is_extended: false,
        }));
    }

    #[test]
    fn cursor_enter_from_a_peer_transitions_to_controlled_and_warps_the_cursor() {
        let (core, _rx, synth, _registry) = make_core();
        core.handle_remote_message(
            &"c".repeat(32),
            KvmMessage::CursorEnter(CursorEnterMessage {
                x: 0.0,
                y: 0.5,
                edge: WireEdge::Left,
            }),
        );
        assert_eq!(core.current_state(), ControlState::Controlled("c".repeat(32)));
        assert_eq!(synth.mouse_events.lock().unwrap().last().unwrap().x, 0);
    }

    #[test]
    fn remote_mouse_is_ignored_unless_currently_controlled_by_that_peer() {
        let (core, _rx, synth, _registry) = make_core();
        core.handle_remote_message(
            &"c".repeat(32),
            KvmMessage::Mouse(MouseMessage {
                x: 100,
                y: 100,
                event_type: MouseEventType::Move,
                wheel_delta: 0,
                velocity: None,
            }),
        );
        assert!(synth.mouse_events.lock().unwrap().is_empty());
    }

    #[test]
    fn cursor_leave_from_the_controlling_peer_returns_to_idle() {
        let (core, _rx, _synth, _registry) = make_core();
        core.handle_remote_message(
            &"c".repeat(32),
            KvmMessage::CursorEnter(CursorEnterMessage {
                x: 0.0,
                y: 0.5,
                edge: WireEdge::Left,
            }),
        );
        core.handle_remote_message(
            &"c".repeat(32),
            KvmMessage::CursorLeave(CursorLeaveMessage {
                x: 0.5,
                y: 0.5,
                edge: WireEdge::Left,
            }),
        );
        assert!(core.current_state().is_idle());
    }

    #[test]
    fn disconnect_while_controlling_forces_idle_and_restores_the_cursor() {
        let (core, mut rx, synth, registry) = make_core();
        register_connected_peer(&registry, "a", Position::Right);
        core.dispatch(RawInputEvent::MouseMove { x: 1919, y: 540 });
        let _ = rx.try_recv();

        core.handle_peer_disconnected(&"a".repeat(32));
        assert!(core.current_state().is_idle());
        assert!(!*synth.cursor_hidden.lock().unwrap());
    }

    #[test]
    fn local_clipboard_change_fans_out_to_every_connected_peer() {
        let (core, mut rx, _synth, registry) = make_core();
        register_connected_peer(&registry, "a", Position::Right);
        register_connected_peer(&registry, "b", Position::Left);

        core.on_local_clipboard_change(ClipboardContent {
            content_type: kvm_core::protocol::messages::ClipboardContentType::Text,
            format_hint: String::new(),
            data: b"hello".to_vec(),
        });

        let mut seen: Vec<MachineId> = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            seen.push(envelope.peer_id);
        }
        seen.sort();
        assert_eq!(seen, vec!["a".repeat(32), "b".repeat(32)]);
    }

    #[test]
    fn remote_clipboard_is_dropped_when_sync_is_disabled() {
        let screen = Arc::new(MockScreenMetrics::single_1080p());
        let synth = Arc::new(MockSynthesizer::new());
        let emulation = Arc::new(EmulationService::new(synth as Arc<_>));
        let clipboard = Arc::new(MockClipboard::default());
        let registry = Arc::new(StdRwLock::new(PeerRegistry::new()));
        let (core, _rx) = ControlCore::new(screen, emulation, Arc::clone(&clipboard), false, registry, EDGE_THRESHOLD);

        core.handle_remote_message(
            &"c".repeat(32),
            KvmMessage::Clipboard(ClipboardMessage {
                content_type: kvm_core::protocol::messages::ClipboardContentType::Text,
                format_hint: String::new(),
                data: b"hi".to_vec(),
            }),
        );
        assert!(clipboard.written.lock().unwrap().is_empty());
    }

    #[test]
    fn point_on_edge_places_left_and_right_edges_at_the_extremes() {
        let bounds = Rect::new(1920, 1080);
        assert_eq!(point_on_edge(&bounds, Edge::Left, 0.5), (0, 540));
        assert_eq!(point_on_edge(&bounds, Edge::Right, 0.0), (1919, 0));
    }
}
