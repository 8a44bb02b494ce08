//! KVM-Over-IP peer daemon entry point.
//!
//! Wires together configuration, platform capability shims, the control
//! core, and the network layer, then runs until `Ctrl-C`.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  ├─ load_config()                 -- reads ~/.config (or platform equiv.)
//!  ├─ build PeerRegistry            -- one entry per configured peer
//!  ├─ platform shims                -- capture/emulation/screen/clipboard
//!  ├─ ControlCore::new()            -- the Idle/Controlling/Controlled machine
//!  ├─ spawn_outbound_pump()         -- drains ControlCore's outbound queue
//!  ├─ start_listener()              -- accepts inbound peer connections
//!  ├─ dial configured peers         -- outbound connection attempts
//!  ├─ start_discovery()             -- UDP presence broadcast/listen
//!  └─ hook.start(control_core)      -- installs the OS input hook
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kvm_core::domain::peer::PeerRecord;
use kvm_core::protocol::messages::HandshakeMessage;
use kvm_core::protocol::KvmMessage;

use kvm_peer::application::control_core::{spawn_outbound_pump, ControlCore};
use kvm_peer::infrastructure::capture::GlobalInputHook;
use kvm_peer::infrastructure::clipboard::{ArboardClipboard, Clipboard};
use kvm_peer::infrastructure::config::{self, AppConfig};
use kvm_peer::infrastructure::emulation::EmulationService;
use kvm_peer::infrastructure::network::connection::{self, ConnectionEvent};
use kvm_peer::infrastructure::network::discovery::{self, DiscoveryEvent, LocalPresence};
use kvm_peer::infrastructure::network::listener::start_listener;
use kvm_peer::infrastructure::network::peer_registry::{LinkState, PeerRegistry};
use kvm_peer::infrastructure::screen::ScreenMetrics;

const HANDSHAKE_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "kvm-peer", about = "KVM-Over-IP peer daemon")]
struct Cli {
    /// Run with the daemon disabled (hooks never installed, input never
    /// suppressed), overriding whatever `enabled` says in the config file.
    #[arg(long)]
    disabled: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config().unwrap_or_else(|e| {
        eprintln!("failed to load config ({e}); starting with defaults");
        AppConfig::new_default(uuid::Uuid::new_v4().to_string())
    });
    if cli.disabled {
        config.enabled = false;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("kvm-peer starting as {} ({})", config.machine_name, config.machine_id);
    if let Err(e) = config::save_config(&config) {
        warn!("failed to persist config: {e}");
    }

    let screen: Arc<dyn ScreenMetrics> = Arc::from(native_screen_metrics()?);
    let local_bounds = screen
        .primary_bounds()
        .map_err(|e| anyhow::anyhow!("failed to read local screen bounds: {e}"))?;

    let mut registry = PeerRegistry::new();
    for peer in &config.peers {
        registry.register(PeerRecord::from_config(
            peer.id.clone(),
            peer.name.clone(),
            peer.address.clone(),
            peer.port,
            peer.position,
            peer.offset_x,
            peer.offset_y,
        ));
    }
    let registry = Arc::new(StdRwLock::new(registry));

    let emulation = Arc::new(EmulationService::new(native_synthesizer()?));
    let clipboard: Arc<dyn Clipboard> = Arc::new(
        ArboardClipboard::new().map_err(|e| anyhow::anyhow!("failed to open clipboard: {e}"))?,
    );

    let (control_core, outbound_rx) = ControlCore::new(
        screen,
        emulation,
        clipboard,
        config.clipboard.enabled,
        Arc::clone(&registry),
        2,
    );

    let shutdown = CancellationToken::new();
    let mut tasks = tokio::task::JoinSet::new();

    let outbound_task = spawn_outbound_pump(Arc::clone(&registry), outbound_rx);

    let local_handshake = || HandshakeMessage {
        machine_id: config.machine_id.clone(),
        machine_name: config.machine_name.clone(),
        screen_width: local_bounds.width,
        screen_height: local_bounds.height,
        supports_clipboard: config.clipboard.enabled,
    };

    match start_listener(config.local_port, local_handshake()).await {
        Ok(mut accepted_rx) => {
            info!("listening for peer connections on TCP {}", config.local_port);
            let registry = Arc::clone(&registry);
            let control_core = Arc::clone(&control_core);
            let shutdown = shutdown.clone();
            tasks.spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        accepted = accepted_rx.recv() => {
                            let Some(accepted) = accepted else { break };
                            let mut r = registry.write().expect("lock poisoned");
                            let id = accepted.info.machine_id.clone();
                            if !r.all().any(|e| e.record.id == id) {
                                info!(
                                    "accepting connection from peer {id} not present in local configuration"
                                );
                                r.register(PeerRecord::from_handshake(
                                    id.clone(),
                                    accepted.info.machine_name.clone(),
                                    accepted.peer_addr.ip().to_string(),
                                    accepted.peer_addr.port(),
                                ));
                            }
                            let old = r.attach_connection(&id, accepted.connection);
                            if let Some(entry) = r.get(&id) {
                                let mut record = entry.record.clone();
                                record.record_handshake(accepted.info.screen_width, accepted.info.screen_height);
                                r.register(record);
                            }
                            drop(r);
                            if let Some(old) = old {
                                warn!("peer {id} reconnected; tearing down its previous connection");
                                let _ = old.send(&KvmMessage::Disconnect).await;
                                old.abort_receive_loop();
                            }
                            spawn_connection_pump(id, accepted.events, Arc::clone(&control_core), Arc::clone(&registry), shutdown.clone());
                        }
                    }
                }
            });
        }
        Err(e) => error!("failed to start listener: {e}"),
    }

    for peer in config.peers.clone() {
        let handshake = local_handshake();
        let registry = Arc::clone(&registry);
        let control_core = Arc::clone(&control_core);
        let shutdown = shutdown.clone();
        tasks.spawn(async move {
            let addr = format!("{}:{}", peer.address, peer.port);
            let socket_addr = match tokio::net::lookup_host(&addr).await {
                Ok(mut it) => match it.next() {
                    Some(a) => a,
                    None => {
                        warn!("could not resolve peer address {addr}");
                        return;
                    }
                },
                Err(e) => {
                    warn!("could not resolve peer address {addr}: {e}");
                    return;
                }
            };
            match connection::connect(socket_addr, handshake, HANDSHAKE_DEADLINE).await {
                Ok((conn, info, events)) => {
                    let id = info.machine_id.clone();
                    let mut r = registry.write().expect("lock poisoned");
                    let old = r.attach_connection(&id, conn);
                    if let Some(entry) = r.get(&id) {
                        let mut record = entry.record.clone();
                        record.record_handshake(info.screen_width, info.screen_height);
                        r.register(record);
                    }
                    drop(r);
                    if let Some(old) = old {
                        warn!("peer {id} reconnected; tearing down its previous connection");
                        let _ = old.send(&KvmMessage::Disconnect).await;
                        old.abort_receive_loop();
                    }
                    spawn_connection_pump(id, events, control_core, registry, shutdown);
                }
                Err(e) => warn!("failed to connect to {} at {addr}: {e}", peer.id),
            }
        });
    }

    let running = Arc::new(AtomicBool::new(true));
    match discovery::start_discovery(
        config.discovery_port,
        LocalPresence {
            machine_id: config.machine_id.clone(),
            machine_name: config.machine_name.clone(),
            listen_port: config.local_port,
            screen_width: local_bounds.width,
            screen_height: local_bounds.height,
        },
        Arc::clone(&running),
    ) {
        Ok(mut discovery_rx) => {
            tasks.spawn(async move {
                while let Some(event) = discovery_rx.recv().await {
                    match event {
                        DiscoveryEvent::PeerDiscovered(p) => {
                            info!("discovered peer {} ({}) at {}", p.name, p.id, p.source_addr);
                        }
                        DiscoveryEvent::PeerLost(id) => {
                            info!("peer {id} is no longer broadcasting presence");
                        }
                    }
                }
            });
        }
        Err(e) => warn!("failed to start discovery: {e}"),
    }

    let hook = native_input_hook()?;
    if config.enabled {
        if let Err(e) = hook.start(Arc::clone(&control_core)) {
            error!("failed to install input hook: {e}");
        }
    } else {
        info!("daemon is disabled in configuration; not installing input hook");
        control_core.force_idle();
    }

    info!("kvm-peer ready. Press Ctrl-C to exit.");
    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");

    running.store(false, Ordering::Relaxed);
    shutdown.cancel();
    hook.stop();
    control_core.force_idle();

    let live_connections: Vec<_> = {
        let r = registry.read().expect("lock poisoned");
        r.connected_peers()
            .filter_map(|e| e.connection.clone())
            .collect()
    };
    for conn in live_connections {
        let _ = conn.send(&KvmMessage::Disconnect).await;
    }

    outbound_task.abort();
    tasks.abort_all();

    info!("kvm-peer stopped");
    Ok(())
}

fn spawn_connection_pump(
    peer_id: kvm_core::domain::peer::MachineId,
    mut events: tokio::sync::mpsc::Receiver<ConnectionEvent>,
    control_core: Arc<ControlCore>,
    registry: Arc<StdRwLock<PeerRegistry>>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => {
                    match event {
                        Some(ConnectionEvent::Message(msg)) => {
                            control_core.handle_remote_message(&peer_id, msg);
                        }
                        Some(ConnectionEvent::Disconnected) | None => {
                            info!("peer {peer_id} disconnected");
                            control_core.handle_peer_disconnected(&peer_id);
                            let mut r = registry.write().expect("lock poisoned");
                            r.detach_connection(&peer_id);
                            r.set_link_state(&peer_id, LinkState::Disconnected);
                            break;
                        }
                    }
                }
            }
        }
    });
}

fn native_screen_metrics() -> anyhow::Result<Box<dyn ScreenMetrics>> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(kvm_peer::infrastructure::screen::windows::WindowsScreenMetrics::new()))
    }
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(
            kvm_peer::infrastructure::screen::linux::X11ScreenMetrics::new()
                .map_err(|e| anyhow::anyhow!("failed to open X11 display for screen metrics: {e}"))?,
        ))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(kvm_peer::infrastructure::screen::macos::CgScreenMetrics::new()))
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        anyhow::bail!("unsupported platform")
    }
}

fn native_synthesizer() -> anyhow::Result<Arc<dyn kvm_peer::infrastructure::emulation::InputSynthesis>> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(kvm_peer::infrastructure::emulation::windows::WindowsSynthesizer::new()))
    }
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(
            kvm_peer::infrastructure::emulation::linux::XTestSynthesizer::new()
                .map_err(|e| anyhow::anyhow!("failed to open X11 display for input synthesis: {e}"))?,
        ))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(
            kvm_peer::infrastructure::emulation::macos::CgEventSynthesizer::new()
                .map_err(|e| anyhow::anyhow!("failed to create CGEventSource: {e}"))?,
        ))
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        anyhow::bail!("unsupported platform")
    }
}

fn native_input_hook() -> anyhow::Result<Box<dyn GlobalInputHook>> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(kvm_peer::infrastructure::capture::windows::WindowsInputHook::new()))
    }
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(kvm_peer::infrastructure::capture::linux::X11InputHook::new()))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(kvm_peer::infrastructure::capture::macos::CgEventTapHook::new()))
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        anyhow::bail!("unsupported platform")
    }
}
