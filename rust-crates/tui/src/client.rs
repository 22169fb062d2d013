use crate::{
    demo::{
        self,
        DEMO_HOST,
        Roster,
    },
    ui,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    anyhow,
    eyre,
};
use drops::{
    Address,
    DropContract,
    DropId,
    DropInfo,
    Participant,
    RewardType,
    TokenInfo,
    contract::select_winners_and_reconcile,
    leaderboard::{
        LeaderboardEntry,
        build_leaderboard,
        format_units,
    },
    neynar::NeynarClient,
    notifications::NotificationRelay,
    profiles::ProfileCache,
    simulated::SimulatedContract,
    winners::{
        distributable,
        prize_split,
        winner_slots,
    },
};
use plinko::{
    Ball,
    Board,
    BoardConfig,
    DropStatus,
    GateDecision,
    IgnoreReason,
    ManualTicket,
    RevealEvent,
    RevealSequencer,
    RevealState,
    RevealedSlot,
    Slot,
    TriggerError,
    WinnerSource,
    WinnersAvailable,
    sequencer::Popup,
    summary::ordinal,
};
use rand::Rng;
use std::{
    collections::HashSet,
    path::Path,
    time::{
        Duration,
        Instant,
    },
};
use tokio::{
    sync::mpsc,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    error,
    info,
    warn,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{
        RollingFileAppender,
        Rotation,
    },
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

const BOARD_ROWS: usize = 16;
const POLL_INTERVAL: Duration = Duration::from_millis(750);
const MAX_ERRORS: usize = 5;
const VIEWER: Address = Address::new([0xfe; 20]);

#[derive(Debug, Clone)]
pub struct NeynarConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub drop_id: DropId,
    pub seed: Option<u64>,
    pub demo_drops: u32,
    pub as_host: bool,
    pub neynar: Option<NeynarConfig>,
    pub notify_url: Option<String>,
    pub app_origin: String,
    pub frame_interval: Duration,
}

/// One drop as last read from the contract.
#[derive(Debug, Clone)]
pub struct DropSnapshot {
    pub info: DropInfo,
    pub participants: Vec<Participant>,
    pub token: TokenInfo,
}

#[derive(Debug, Clone)]
pub struct SnapshotBundle {
    pub drop_count: u64,
    pub drop: Option<DropSnapshot>,
}

#[derive(Debug, Clone)]
pub struct DropView {
    pub info: DropInfo,
    pub token: TokenInfo,
    /// participant label per board slot, `None` for open slots
    pub labels: Vec<Option<String>>,
    pub prizes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub label: String,
    pub wins: u32,
    pub prizes: String,
}

/// Everything the UI needs for one frame.
#[derive(Debug, Clone)]
pub struct AppSnapshot {
    pub drop_id: DropId,
    pub drop_count: u64,
    pub drop: Option<DropView>,
    pub board: Board,
    pub ball: Option<Ball>,
    pub revealed: Vec<RevealedSlot>,
    pub reveal_state: RevealState,
    pub popup: Option<Popup>,
    pub is_host: bool,
    pub manual_hint: Option<String>,
    pub status: String,
    pub errors: Vec<String>,
    pub leaderboard: Option<Vec<LeaderboardRow>>,
    pub profiles_loading: bool,
}

#[derive(Debug)]
struct ManualOutcome {
    ticket: ManualTicket,
    outcome: std::result::Result<Vec<Slot>, String>,
}

pub struct AppController {
    contract: SimulatedContract,
    viewer: Address,
    sequencer: RevealSequencer,
    drop_id: DropId,
    drop_count: u64,
    platform_fee_bps: u16,
    current: Option<DropSnapshot>,
    /// drops with a winner selection write still awaiting confirmation
    selections_in_flight: HashSet<DropId>,
    profiles: Option<ProfileCache<NeynarClient>>,
    roster: Roster,
    leaderboard: Option<Vec<LeaderboardEntry>>,
    status: String,
    errors: Vec<String>,
}

async fn fetch_drop<C: DropContract>(contract: &C, id: DropId) -> drops::Result<DropSnapshot> {
    let info = contract.drop_info(id).await?;
    let participants = contract.participants(id).await?;
    let token = if info.reward_token.is_zero() {
        TokenInfo::eth()
    } else {
        match contract.token_info(info.reward_token).await {
            Ok(token) => token,
            Err(err) => {
                debug!(?err, token = %info.reward_token, "token metadata unavailable");
                TokenInfo::fallback(&info.reward_token)
            }
        }
    };
    Ok(DropSnapshot {
        info,
        participants,
        token,
    })
}

fn board_for(info: &DropInfo) -> Result<Board> {
    let slots = usize::try_from(info.max_participants)
        .wrap_err("max participants does not fit the board")?;
    Board::new(BoardConfig::new(BOARD_ROWS, slots))
        .wrap_err_with(|| format!("drop {} has no valid board", info.id))
}

fn prize_lines(info: &DropInfo, token: &TokenInfo, platform_fee_bps: u16) -> Vec<String> {
    let winners = usize::from(info.num_winners);
    if info.reward_type == RewardType::Nft {
        return info
            .reward_token_ids
            .iter()
            .take(winners)
            .enumerate()
            .map(|(i, id)| format!("{}: NFT #{id}", ordinal(i + 1)))
            .collect();
    }
    prize_split(distributable(info, platform_fee_bps), winners)
        .into_iter()
        .enumerate()
        .map(|(i, share)| {
            format!(
                "{}: {} {}",
                ordinal(i + 1),
                format_units(share, token.decimals),
                token.symbol
            )
        })
        .collect()
}

impl AppController {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        info!(seed, "starting simulated contract");
        let contract =
            SimulatedContract::new(seed).with_platform_fee_bps(demo::DEMO_PLATFORM_FEE_BPS);
        let relay = config
            .notify_url
            .map(|url| NotificationRelay::new(url, config.app_origin.clone()))
            .transpose()
            .wrap_err("failed to build HTTP client for notifications")?;
        let profiles = config
            .neynar
            .map(|neynar| NeynarClient::new(neynar.url, neynar.api_key))
            .transpose()
            .wrap_err("failed to build HTTP client for profiles")?
            .map(ProfileCache::new);

        let mut roster = Roster::default();
        demo::seed_demo_drops(&contract, &mut roster, relay.as_ref(), config.demo_drops).await?;

        let drop_count = contract.drop_count().await?;
        if drop_count == 0 {
            return Err(eyre!("no drops to show; pass --demo-drops 1 or more"));
        }
        if config.drop_id >= drop_count {
            return Err(eyre!(
                "drop {} does not exist, there are {drop_count} drops",
                config.drop_id
            ));
        }
        let snapshot = fetch_drop(&contract, config.drop_id)
            .await
            .wrap_err_with(|| format!("loading drop {} failed", config.drop_id))?;
        let board = board_for(&snapshot.info)?;
        let sequencer = RevealSequencer::with_seed(
            config.drop_id,
            board,
            usize::from(snapshot.info.num_winners),
            seed,
        );
        let platform_fee_bps = contract.platform_fee_bps().await?;
        let viewer = if config.as_host { DEMO_HOST } else { VIEWER };

        let mut controller = Self {
            contract,
            viewer,
            sequencer,
            drop_id: config.drop_id,
            drop_count,
            platform_fee_bps,
            current: Some(snapshot),
            selections_in_flight: HashSet::new(),
            profiles,
            roster,
            leaderboard: None,
            status: format!("Viewing drop #{}", config.drop_id),
            errors: Vec::new(),
        };
        controller.offer_winners();
        Ok(controller)
    }

    pub fn drop_id(&self) -> DropId {
        self.drop_id
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.errors.clear();
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    fn drop_status(&self) -> DropStatus {
        self.current
            .as_ref()
            .map(|current| DropStatus {
                is_host: current.info.host == self.viewer,
                is_manual_selection: current.info.is_manual_selection,
                is_active: current.info.is_active,
                is_completed: current.info.is_completed,
            })
            .unwrap_or_default()
    }

    /// Feeds the winners stored on the contract to the reveal gate. Repeated
    /// polls of the same result are turned away by the gate.
    fn offer_winners(&mut self) {
        let Some(current) = self.current.as_ref() else {
            return;
        };
        if !current.info.has_winners() {
            return;
        }
        let slots = winner_slots(&current.info.winners, &current.participants);
        let status = self.drop_status();
        if let GateDecision::Start(slots) = self.sequencer.offer(&status, WinnersAvailable::auto(slots)) {
            debug!(drop_id = self.drop_id, ?slots, "reveal started from contract state");
        }
    }

    pub fn ingest_snapshot(&mut self, bundle: SnapshotBundle) {
        self.drop_count = bundle.drop_count;
        let Some(snapshot) = bundle.drop else {
            return;
        };
        if snapshot.info.id != self.drop_id {
            debug!(stale = snapshot.info.id, drop_id = self.drop_id, "ignoring snapshot of another drop");
            return;
        }
        self.current = Some(snapshot);
        self.offer_winners();
    }

    pub async fn select_drop(&mut self, id: DropId) -> Result<()> {
        let snapshot = fetch_drop(&self.contract, id)
            .await
            .wrap_err_with(|| format!("loading drop {id} failed"))?;
        let board = board_for(&snapshot.info)?;
        self.sequencer
            .reset_for_drop(id, board, usize::from(snapshot.info.num_winners));
        self.drop_id = id;
        self.current = Some(snapshot);
        self.set_status(format!("Viewing drop #{id}"));
        self.offer_winners();
        Ok(())
    }

    pub fn next_drop_id(&self) -> DropId {
        (self.drop_id + 1) % self.drop_count.max(1)
    }

    pub fn prev_drop_id(&self) -> DropId {
        let count = self.drop_count.max(1);
        (self.drop_id + count - 1) % count
    }

    /// A selection write cannot be cancelled, so it keeps its drop blocked
    /// even after the board was switched away and back.
    fn manual_block_reason(&self, status: &DropStatus) -> Option<IgnoreReason> {
        self.sequencer.manual_block_reason(status).or_else(|| {
            self.selections_in_flight
                .contains(&self.drop_id)
                .then_some(IgnoreReason::SelectionPending)
        })
    }

    fn begin_manual_drop(&mut self) -> std::result::Result<ManualTicket, TriggerError> {
        let status = self.drop_status();
        if let Some(reason) = self.manual_block_reason(&status) {
            return Err(TriggerError::NotAllowed(reason));
        }
        let ticket = self.sequencer.begin_manual(&status)?;
        self.selections_in_flight.insert(ticket.drop_id());
        self.set_status("Selecting winners... please wait.");
        Ok(ticket)
    }

    fn spawn_manual_selection(&self, ticket: ManualTicket, tx: mpsc::UnboundedSender<ManualOutcome>) {
        let contract = self.contract.clone();
        let caller = self.viewer;
        let id = ticket.drop_id();
        tokio::spawn(async move {
            let outcome = select_winners_and_reconcile(&contract, id, caller)
                .await
                .map_err(|err| err.to_string());
            if tx.send(ManualOutcome { ticket, outcome }).is_err() {
                debug!(drop_id = id, "app loop gone before winner selection finished");
            }
        });
    }

    fn finish_manual_drop(&mut self, manual: ManualOutcome) {
        self.selections_in_flight.remove(&manual.ticket.drop_id());
        let status = self.drop_status();
        match self
            .sequencer
            .finish_manual(manual.ticket, &status, manual.outcome)
        {
            Ok(true) => info!(drop_id = self.drop_id, "manual reveal started"),
            Ok(false) => {}
            Err(err) => self.push_errors(vec![format!("Winner selection failed: {err}")]),
        }
    }

    pub async fn join_random_player(&mut self) {
        let (player, name) = self.roster.next_player();
        let label = name.clone().unwrap_or_else(|| player.short());
        match self.contract.join_drop(player, self.drop_id, name).await {
            Ok(()) => self.set_status(format!("{label} joined drop #{}", self.drop_id)),
            Err(err) => self.push_errors(vec![format!("Join failed: {err}")]),
        }
    }

    pub async fn open_leaderboard(&mut self) -> Result<()> {
        let entries = build_leaderboard(&self.contract)
            .await
            .wrap_err("building leaderboard failed")?;
        info!(entries = entries.len(), "leaderboard built");
        self.leaderboard = Some(entries);
        Ok(())
    }

    pub fn close_leaderboard(&mut self) {
        self.leaderboard = None;
    }

    fn profile_label(&self, address: &Address) -> Option<String> {
        self.profiles
            .as_ref()?
            .get(address)
            .filter(|profile| profile.is_found())
            .map(|profile| profile.label())
    }

    fn slot_label(&self, slot: Slot) -> String {
        self.current
            .as_ref()
            .and_then(|current| current.participants.iter().find(|p| p.slot == slot))
            .map(|p| self.profile_label(&p.address).unwrap_or_else(|| p.name.clone()))
            .unwrap_or_else(|| "(open slot)".to_string())
    }

    fn unresolved_addresses(&self) -> Vec<Address> {
        let Some(cache) = self.profiles.as_ref() else {
            return Vec::new();
        };
        let participants = self
            .current
            .iter()
            .flat_map(|current| current.participants.iter().map(|p| p.address));
        let leaders = self
            .leaderboard
            .iter()
            .flat_map(|entries| entries.iter().map(|e| e.address));
        participants
            .chain(leaders)
            .filter(|address| cache.get(address).is_none())
            .collect()
    }

    fn spawn_profile_lookup(&self, tx: &mpsc::UnboundedSender<()>) {
        let Some(cache) = self.profiles.clone() else {
            return;
        };
        let missing = self.unresolved_addresses();
        if missing.is_empty() {
            return;
        }
        let tx = tx.clone();
        tokio::spawn(async move {
            let resolved = cache.resolve_many(&missing).await;
            debug!(resolved = resolved.len(), "profile lookup finished");
            let _ = tx.send(());
        });
    }

    /// One animation frame.
    pub fn advance(&mut self, dt: Duration) {
        self.sequencer.advance(dt);
        for event in self.sequencer.drain_events() {
            self.apply_reveal_event(event);
        }
    }

    fn apply_reveal_event(&mut self, event: RevealEvent) {
        match event {
            RevealEvent::Started { source, slots } => {
                let kind = match source {
                    WinnerSource::Manual => "host",
                    WinnerSource::Auto => "drawn",
                };
                let plural = if slots.len() == 1 { "" } else { "s" };
                self.status = format!("Revealing {} {kind} winner{plural}...", slots.len());
            }
            RevealEvent::BallSpawned { rank, slot } => {
                debug!(rank, slot, "ball dropped");
            }
            RevealEvent::SlotRevealed { rank, slot } => {
                let who = self.slot_label(slot);
                self.status = format!("{} place: #{} {who}", ordinal(rank), slot + 1);
            }
            RevealEvent::Completed { summary } => {
                self.status = summary;
            }
            RevealEvent::Faded => {}
            RevealEvent::Cancelled { drop_id } => {
                info!(drop_id, "reveal cancelled");
            }
            RevealEvent::Skipped { slot } => {
                self.push_errors(vec![format!("Winner slot #{} is not on this board", slot + 1)]);
            }
        }
    }

    fn drop_view(&self, current: &DropSnapshot) -> DropView {
        let mut labels = vec![None; self.sequencer.board().slot_count()];
        for participant in &current.participants {
            if let Some(label) = labels.get_mut(participant.slot) {
                *label = Some(
                    self.profile_label(&participant.address)
                        .unwrap_or_else(|| participant.name.clone()),
                );
            }
        }
        DropView {
            info: current.info.clone(),
            token: current.token.clone(),
            labels,
            prizes: prize_lines(&current.info, &current.token, self.platform_fee_bps),
        }
    }

    pub fn build_snapshot(&self) -> AppSnapshot {
        let status = self.drop_status();
        let manual_hint = (status.is_host && status.is_manual_selection && !status.is_completed)
            .then(|| match self.manual_block_reason(&status) {
                None => "Press d to drop the ball and select winners".to_string(),
                Some(reason) => format!("Manual drop unavailable: {reason}"),
            });
        let leaderboard = self.leaderboard.as_ref().map(|entries| {
            entries
                .iter()
                .map(|entry| LeaderboardRow {
                    label: self
                        .profile_label(&entry.address)
                        .unwrap_or_else(|| entry.address.short()),
                    wins: entry.wins,
                    prizes: entry.prize_summary(),
                })
                .collect()
        });
        AppSnapshot {
            drop_id: self.drop_id,
            drop_count: self.drop_count,
            drop: self.current.as_ref().map(|current| self.drop_view(current)),
            board: self.sequencer.board().clone(),
            ball: self.sequencer.active_ball().cloned(),
            revealed: self.sequencer.revealed().to_vec(),
            reveal_state: self.sequencer.state(),
            popup: self.sequencer.popup(),
            is_host: status.is_host,
            manual_hint,
            status: self.status.clone(),
            errors: self.errors.clone(),
            leaderboard,
            profiles_loading: self
                .profiles
                .as_ref()
                .is_some_and(|cache| cache.is_loading()),
        }
    }
}

/// Logs go to a daily rolling file; the terminal belongs to the UI.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("fireball-drop")
        .filename_suffix("log")
        .build(log_dir)
        .wrap_err_with(|| format!("cannot write logs to {}", log_dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Ok(guard)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let frame_interval = config.frame_interval;
    let controller = AppController::new(config).await?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    info!("UI ready");
    let res = run_loop(controller, &mut ui_state, &mut input_events, frame_interval).await;
    ui::terminal_exit()?;
    res
}

enum SnapshotWorkerCommand {
    Watch(DropId),
    FetchNow,
    Shutdown,
}

async fn snapshot_worker<C: DropContract + Sync>(
    poll_interval: Duration,
    contract: C,
    mut drop_id: DropId,
    mut cmd_rx: mpsc::UnboundedReceiver<SnapshotWorkerCommand>,
    snapshot_tx: mpsc::UnboundedSender<SnapshotBundle>,
) -> Result<()> {
    async fn fetch_snapshot<C: DropContract + Sync>(
        contract: &C,
        drop_id: DropId,
        snapshot_tx: &mpsc::UnboundedSender<SnapshotBundle>,
    ) -> Result<()> {
        let drop_count = contract.drop_count().await?;
        let drop = match fetch_drop(contract, drop_id).await {
            Ok(drop) => Some(drop),
            Err(err) => {
                warn!(drop_id, %err, "drop fetch failed");
                None
            }
        };
        snapshot_tx
            .send(SnapshotBundle { drop_count, drop })
            .map_err(|_| eyre!("snapshot receiver dropped"))?;
        Ok(())
    }

    let mut ticker = time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = fetch_snapshot(&contract, drop_id, &snapshot_tx).await {
                    warn!(?err, "snapshot fetch failed");
                    if snapshot_tx.is_closed() {
                        break;
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                match cmd {
                    SnapshotWorkerCommand::Watch(id) => {
                        drop_id = id;
                        ticker.reset();
                    }
                    SnapshotWorkerCommand::FetchNow => {
                        if let Err(err) = fetch_snapshot(&contract, drop_id, &snapshot_tx).await {
                            warn!(?err, "snapshot fetch failed");
                        }
                    }
                    SnapshotWorkerCommand::Shutdown => break,
                }
            }
        }
    }
    Ok(())
}

async fn run_loop(
    mut controller: AppController,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
    frame_interval: Duration,
) -> Result<()> {
    info!("Running app loop");
    let (snapshot_cmd_tx, snapshot_cmd_rx) = mpsc::unbounded_channel();
    let (snapshot_event_tx, mut snapshot_event_rx) = mpsc::unbounded_channel();
    let snapshot_handle = tokio::spawn(snapshot_worker(
        POLL_INTERVAL,
        controller.contract.clone(),
        controller.drop_id(),
        snapshot_cmd_rx,
        snapshot_event_tx,
    ));
    let (manual_tx, mut manual_rx) = mpsc::unbounded_channel();
    let (profile_tx, mut profile_rx) = mpsc::unbounded_channel();
    controller.spawn_profile_lookup(&profile_tx);

    let mut frames = time::interval(frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_frame = Instant::now();
    let mut snapshot_worker_closed = false;

    loop {
        tokio::select! {
            maybe_bundle = snapshot_event_rx.recv() => {
                let Some(bundle) = maybe_bundle else {
                    warn!("snapshot worker channel closed");
                    snapshot_worker_closed = true;
                    break;
                };
                controller.ingest_snapshot(bundle);
                controller.spawn_profile_lookup(&profile_tx);
            }
            Some(manual) = manual_rx.recv() => {
                controller.finish_manual_drop(manual);
                let _ = snapshot_cmd_tx.send(SnapshotWorkerCommand::FetchNow);
            }
            Some(()) = profile_rx.recv() => {
                debug!("profiles updated");
            }
            _ = frames.tick() => {
                let now = Instant::now();
                controller.advance(now.duration_since(last_frame));
                last_frame = now;
                let snapshot = controller.build_snapshot();
                ui::draw(ui_state, &snapshot).wrap_err("draw failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::DropBall => match controller.begin_manual_drop() {
                        Ok(ticket) => controller.spawn_manual_selection(ticket, manual_tx.clone()),
                        Err(err) => controller.push_errors(vec![format!("Cannot drop the ball: {err}")]),
                    },
                    ui::UserEvent::NextDrop | ui::UserEvent::PrevDrop => {
                        let target = if matches!(ev, ui::UserEvent::NextDrop) {
                            controller.next_drop_id()
                        } else {
                            controller.prev_drop_id()
                        };
                        match controller.select_drop(target).await {
                            Ok(()) => {
                                let _ = snapshot_cmd_tx.send(SnapshotWorkerCommand::Watch(target));
                                controller.spawn_profile_lookup(&profile_tx);
                            }
                            Err(err) => controller.push_errors(vec![format!("{err:#}")]),
                        }
                    }
                    ui::UserEvent::Join => {
                        controller.join_random_player().await;
                        let _ = snapshot_cmd_tx.send(SnapshotWorkerCommand::FetchNow);
                    }
                    ui::UserEvent::OpenLeaderboard => {
                        match controller.open_leaderboard().await {
                            Ok(()) => controller.spawn_profile_lookup(&profile_tx),
                            Err(err) => {
                                ui::close_overlay(ui_state);
                                controller.push_errors(vec![format!("{err:#}")]);
                            }
                        }
                    }
                    ui::UserEvent::CloseLeaderboard => controller.close_leaderboard(),
                    ui::UserEvent::Redraw => {}
                }
            }
        }
    }

    let _ = snapshot_cmd_tx.send(SnapshotWorkerCommand::Shutdown);
    match snapshot_handle.await {
        Ok(Ok(())) => {
            if snapshot_worker_closed {
                return Err(anyhow!("Snapshot worker exited unexpectedly"));
            }
        }
        Ok(Err(err)) => {
            return Err(err).wrap_err("snapshot worker failed");
        }
        Err(err) => {
            return Err(anyhow!(err)).wrap_err("snapshot worker panicked");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn config(drop_id: DropId, as_host: bool) -> AppConfig {
        AppConfig {
            drop_id,
            seed: Some(11),
            demo_drops: 6,
            as_host,
            neynar: None,
            notify_url: None,
            app_origin: "http://localhost".to_string(),
            frame_interval: Duration::from_millis(16),
        }
    }

    fn run_until_idle(controller: &mut AppController) {
        for _ in 0..20_000 {
            controller.advance(Duration::from_millis(16));
            if controller.sequencer.state().is_idle() {
                return;
            }
        }
        panic!("reveal never finished");
    }

    #[tokio::test]
    async fn new__completed_drop_starts_reveal_immediately() {
        // when
        let controller = AppController::new(config(1, false)).await.unwrap();

        // then
        assert!(matches!(controller.sequencer.state(), RevealState::Dropping { .. }));
        assert!(controller.build_snapshot().ball.is_some());
    }

    #[tokio::test]
    async fn ingest_snapshot__same_winners_do_not_replay() {
        // given
        let mut controller = AppController::new(config(1, false)).await.unwrap();
        run_until_idle(&mut controller);
        let drop = fetch_drop(&controller.contract, 1).await.unwrap();

        // when
        controller.ingest_snapshot(SnapshotBundle {
            drop_count: 6,
            drop: Some(drop),
        });

        // then
        assert!(controller.sequencer.state().is_idle());
        assert_eq!(controller.sequencer.revealed().len(), 1);
    }

    #[tokio::test]
    async fn select_drop__cancels_running_reveal() {
        // given
        let mut controller = AppController::new(config(1, false)).await.unwrap();
        controller.advance(Duration::from_millis(16));

        // when
        controller.select_drop(2).await.unwrap();

        // then
        assert!(controller.sequencer.state().is_idle());
        assert!(controller.build_snapshot().ball.is_none());
        assert_eq!(controller.drop_id(), 2);
    }

    #[tokio::test]
    async fn begin_manual_drop__requires_host() {
        // given
        let mut controller = AppController::new(config(0, false)).await.unwrap();

        // when
        let result = controller.begin_manual_drop();

        // then
        assert!(matches!(result, Err(TriggerError::NotAllowed(_))));
    }

    #[tokio::test]
    async fn manual_drop__reveals_winners_read_back_from_contract() {
        // given
        let mut controller = AppController::new(config(0, true)).await.unwrap();
        let ticket = controller.begin_manual_drop().unwrap();
        let outcome = select_winners_and_reconcile(&controller.contract, 0, DEMO_HOST)
            .await
            .map_err(|err| err.to_string());
        let expected = outcome.clone().unwrap();

        // when
        controller.finish_manual_drop(ManualOutcome { ticket, outcome });
        run_until_idle(&mut controller);

        // then
        let revealed: Vec<_> = controller.sequencer.revealed().iter().map(|r| r.slot).collect();
        assert_eq!(revealed, expected);
        assert_eq!(revealed.len(), 3);
    }

    #[tokio::test]
    async fn finish_manual_drop__stale_ticket_after_drop_change_is_ignored() {
        // given
        let mut controller = AppController::new(config(0, true)).await.unwrap();
        let ticket = controller.begin_manual_drop().unwrap();
        controller.select_drop(3).await.unwrap();

        // when
        controller.finish_manual_drop(ManualOutcome {
            ticket,
            outcome: Ok(vec![0, 1]),
        });

        // then
        assert!(controller.sequencer.state().is_idle());
        assert!(controller.errors.is_empty());
    }

    #[tokio::test]
    async fn begin_manual_drop__blocked_after_switching_back_while_selection_in_flight() {
        // given
        let mut controller = AppController::new(config(0, true)).await.unwrap();
        let ticket = controller.begin_manual_drop().unwrap();
        controller.select_drop(1).await.unwrap();
        controller.select_drop(0).await.unwrap();

        // when
        let second = controller.begin_manual_drop();

        // then
        assert_eq!(
            second,
            Err(TriggerError::NotAllowed(IgnoreReason::SelectionPending))
        );
        assert!(controller.build_snapshot().manual_hint.is_some_and(|hint| hint.contains("unavailable")));

        // when
        controller.finish_manual_drop(ManualOutcome {
            ticket,
            outcome: Err("execution reverted".to_string()),
        });
        let retry = controller.begin_manual_drop();

        // then
        assert!(retry.is_ok());
    }

    #[tokio::test]
    async fn join_random_player__reports_full_drop() {
        // given
        let mut controller = AppController::new(config(1, false)).await.unwrap();

        // when
        controller.join_random_player().await;

        // then
        assert_eq!(controller.errors.len(), 1);
        assert!(controller.errors[0].starts_with("Join failed"));
    }

    #[test]
    fn prize_lines__splits_after_platform_fee() {
        // given
        let info = DropInfo {
            id: 0,
            host: DEMO_HOST,
            sponsor: Address::ZERO,
            entry_fee: 0,
            reward_amount: 1_000_000,
            reward_token: demo::DEMO_USDC,
            reward_type: RewardType::Usdc,
            reward_token_ids: Vec::new(),
            max_participants: 4,
            current_participants: 4,
            is_active: true,
            is_completed: false,
            is_paid_entry: false,
            is_manual_selection: false,
            is_sponsored: false,
            num_winners: 2,
            funding_deadline: 0,
            winners: Vec::new(),
        };
        let token = TokenInfo {
            decimals: 6,
            symbol: "USDC".to_string(),
            name: "USD Coin".to_string(),
        };

        // when
        let lines = prize_lines(&info, &token, 1_000);

        // then
        assert_eq!(lines, vec!["1st: 0.54 USDC", "2nd: 0.36 USDC"]);
    }
}
