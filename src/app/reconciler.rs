//! The proposal synchronization engine.
//!
//! One [`Reconciler::run_cycle`] fetches the open list, diffs every known
//! proposal against it, persists the result through the [`ProposalBook`] and
//! emits at most one event per observed transition.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::ProposalBook;
use crate::domain::{AppError, Proposal, ProposalEvent, RawProposal, ReconcileConfig};
use crate::ports::{NotificationSink, ProposalStore, RemoteSource};

/// Event and error counts of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub open: usize,
    pub published: usize,
    pub updated: usize,
    pub reminded: usize,
    pub ended: usize,
    /// Records dropped because they failed to parse.
    pub skipped: usize,
    pub errors: usize,
}

impl CycleReport {
    /// Proposal events emitted, errors excluded.
    pub fn events(&self) -> usize {
        self.published + self.updated + self.reminded + self.ended
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} open, {} published, {} updated, {} reminded, {} ended, {} skipped, {} errors",
            self.open,
            self.published,
            self.updated,
            self.reminded,
            self.ended,
            self.skipped,
            self.errors
        )
    }
}

pub struct Reconciler {
    remote: Box<dyn RemoteSource>,
    book: ProposalBook,
    sink: Arc<dyn NotificationSink>,
    policy: ReconcileConfig,
    /// Consecutive detail-fetch failures per ended proposal.
    detail_failures: HashMap<u64, u32>,
    /// Ended proposals whose detail could not be loaded within the retry budget.
    stale: BTreeSet<u64>,
    last_fetch_error: Option<String>,
}

impl Reconciler {
    pub fn new(
        remote: Box<dyn RemoteSource>,
        store: Arc<dyn ProposalStore>,
        sink: Arc<dyn NotificationSink>,
        policy: ReconcileConfig,
    ) -> Self {
        Self {
            remote,
            book: ProposalBook::new(store),
            sink,
            policy,
            detail_failures: HashMap::new(),
            stale: BTreeSet::new(),
            last_fetch_error: None,
        }
    }

    /// Handle for the read side; stays valid while the reconciler runs elsewhere.
    pub fn book(&self) -> ProposalBook {
        self.book.clone()
    }

    /// Ids left stale after exhausting their detail-fetch attempts.
    pub fn stale_proposals(&self) -> Vec<u64> {
        self.stale.iter().copied().collect()
    }

    /// Load the working set from the store.
    ///
    /// Rows that do not parse are skipped; rows with an unknown status are
    /// skipped and surfaced to the operator. Only a failing store is an error.
    pub fn hydrate(&mut self) -> Result<usize, AppError> {
        log::info!("hydrating proposals from store");

        let mut loaded = Vec::new();
        for raw in self.book.store().get_proposals()? {
            match Proposal::from_raw(&raw) {
                Ok(proposal) => loaded.push(proposal),
                Err(AppError::InvalidState(status)) => {
                    self.report_error(AppError::InvalidState(status).to_string());
                }
                Err(e) => log::warn!("Could not create proposal from stored row: {}", e),
            }
        }

        let count = self.book.load(loaded);
        log::info!("{} proposals loaded", count);
        Ok(count)
    }

    pub fn run_cycle(&mut self) -> Result<CycleReport, AppError> {
        self.run_cycle_at(Utc::now())
    }

    /// Run one cycle with `now` as the reference time for reminders.
    ///
    /// Fails only when the open list cannot be fetched; everything after that
    /// is handled per proposal and counted in the report.
    pub fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport, AppError> {
        log::info!("update");

        let listing = match self.remote.fetch_open_proposals() {
            Ok(listing) => {
                self.last_fetch_error = None;
                listing
            }
            Err(e) => {
                self.fetch_failed(&e);
                return Err(e);
            }
        };

        let mut report = CycleReport { skipped: listing.rejected, ..CycleReport::default() };
        let fetched = Self::parse_open(listing.proposals, &mut report);
        report.open = fetched.len();

        if fetched.is_empty() {
            log::info!("Currently no proposal open for voting");
        } else {
            log::info!("{} open proposals found", fetched.len());
        }

        for known in self.book.snapshot() {
            match fetched.get(&known.proposal_id) {
                Some(fresh) => self.reconcile_listed(&known, fresh, now, &mut report),
                None if known.is_open() => self.reconcile_ended(&known, &mut report),
                None => {}
            }
        }

        for (id, fresh) in fetched {
            if !self.book.contains(id) {
                self.publish(fresh, &mut report);
            }
        }

        log::info!("cycle finished: {}", report);
        Ok(report)
    }

    fn parse_open(raws: Vec<RawProposal>, report: &mut CycleReport) -> BTreeMap<u64, Proposal> {
        let mut fetched = BTreeMap::new();
        for raw in raws {
            match Proposal::from_raw(&raw) {
                Ok(proposal) => {
                    fetched.insert(proposal.proposal_id, proposal);
                }
                Err(e) => {
                    log::warn!("Could not create proposal from raw data: {}", e);
                    report.skipped += 1;
                }
            }
        }
        fetched
    }

    /// Still listed as open: report tally/status changes, refresh display
    /// fields silently and fire the reminder once.
    ///
    /// The reminder needs a parseable `votingDeadline`. A deadline that does
    /// not parse reads as 0 seconds remaining but never triggers a reminder.
    fn reconcile_listed(
        &mut self,
        known: &Proposal,
        fresh: &Proposal,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let id = known.proposal_id;
        self.detail_failures.remove(&id);
        self.stale.remove(&id);

        let changes = known.tracked_changes(fresh);
        let mut merged = known.refreshed_from(fresh);

        let remind = !merged.reminder()
            && merged.is_open()
            && merged.deadline().is_some()
            && merged.remaining_seconds_at(now) < self.policy.reminder_window_secs;
        if remind {
            merged.set_reminder();
        }

        if merged == *known {
            return;
        }

        let committed = match self.book.commit(merged) {
            Ok(committed) => committed,
            Err(e) => {
                report.errors += 1;
                self.report_error(format!("Could not update proposal {}: {}", id, e));
                return;
            }
        };

        if !changes.is_empty() {
            log::info!("Proposal {} updated ({} fields)", id, changes.len());
            report.updated += 1;
            self.sink.notify(ProposalEvent::Updated { changes, proposal: committed.clone() });
        } else {
            log::debug!("Proposal {} refreshed", id);
        }

        if remind {
            log::info!("Proposal {} closes soon, sending reminder", id);
            report.reminded += 1;
            self.sink.notify(ProposalEvent::Reminder(committed));
        }
    }

    /// Open locally but gone from the open list: load the final record.
    ///
    /// A detail that still reports open counts against the same attempt budget
    /// as a failed fetch.
    fn reconcile_ended(&mut self, known: &Proposal, report: &mut CycleReport) {
        let id = known.proposal_id;
        if self.stale.contains(&id) {
            return;
        }

        log::info!("Proposal {} left the open list, loading detail", id);
        let detailed = match self.remote.fetch_detail(id).and_then(|raw| Proposal::from_raw(&raw)) {
            Ok(detailed) => detailed,
            Err(e) => {
                report.errors += 1;
                self.detail_failed(id, e);
                return;
            }
        };

        if detailed.is_open() {
            report.errors += 1;
            let error = AppError::Fetch("detail still reports open".into());
            self.detail_failed(id, error);
            return;
        }
        self.detail_failures.remove(&id);

        for (field, change) in known.tracked_changes(&detailed) {
            log::debug!("Proposal {} {}: {} -> {}", id, field, change.before, change.now);
        }

        match self.book.commit(known.refreshed_from(&detailed)) {
            Ok(committed) => {
                log::info!("Proposal {} ended with status {}", id, committed.status);
                report.ended += 1;
                self.sink.notify(ProposalEvent::Ended(committed));
            }
            Err(e) => {
                report.errors += 1;
                self.report_error(format!("Could not store ended proposal {}: {}", id, e));
            }
        }
    }

    fn publish(&mut self, fresh: Proposal, report: &mut CycleReport) {
        let id = fresh.proposal_id;
        match self.book.insert_new(fresh) {
            Ok(added) => {
                log::info!("Add {}", added.title);
                report.published += 1;
                self.sink.notify(ProposalEvent::Published(added));
            }
            Err(e) => {
                report.errors += 1;
                self.report_error(format!("Could not add proposal {}: {}", id, e));
            }
        }
    }

    fn detail_failed(&mut self, id: u64, error: AppError) {
        let attempts = {
            let entry = self.detail_failures.entry(id).or_insert(0);
            *entry += 1;
            *entry
        };
        let max = self.policy.max_detail_attempts;
        log::error!("Could not load proposal {} (attempt {}/{}): {}", id, attempts, max, error);

        if attempts == 1 {
            self.sink.notify(ProposalEvent::Error(format!("Could not load proposal {}: {}", id, error)));
        }

        if attempts >= max {
            self.detail_failures.remove(&id);
            self.stale.insert(id);
            self.report_error(format!(
                "Giving up on proposal {} after {} failed detail fetches; local record left stale",
                id, attempts
            ));
        }
    }

    /// Surface a failed open-list fetch once per distinct error.
    fn fetch_failed(&mut self, error: &AppError) {
        let message = error.to_string();
        log::error!("Could not fetch open proposals: {}", message);
        if self.last_fetch_error.as_deref() != Some(message.as_str()) {
            self.sink.notify(ProposalEvent::Error(format!("Could not fetch open proposals: {}", message)));
            self.last_fetch_error = Some(message);
        }
    }

    fn report_error(&self, message: String) {
        log::error!("{}", message);
        self.sink.notify(ProposalEvent::Error(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryProposalStore;
    use crate::domain::{Channel, FieldValue, Tally, TrackedField};
    use crate::testing::{FakePortal, RecordingSink, raw_proposal, with_field};
    use chrono::TimeZone;

    struct Harness {
        portal: FakePortal,
        store: MemoryProposalStore,
        sink: RecordingSink,
        reconciler: Reconciler,
    }

    fn harness_with(policy: ReconcileConfig, rows: Vec<RawProposal>) -> Harness {
        let portal = FakePortal::new();
        let store = MemoryProposalStore::with_rows(rows);
        let sink = RecordingSink::new();
        let mut reconciler = Reconciler::new(
            Box::new(portal.clone()),
            Arc::new(store.clone()),
            Arc::new(sink.clone()),
            policy,
        );
        reconciler.hydrate().unwrap();
        Harness { portal, store, sink, reconciler }
    }

    fn harness(rows: Vec<RawProposal>) -> Harness {
        harness_with(ReconcileConfig::default(), rows)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn new_proposal_is_published_once() {
        let mut h = harness(vec![]);
        h.portal.set_open(vec![raw_proposal(200, "open")]);

        let report = h.reconciler.run_cycle_at(now()).unwrap();
        let events = h.sink.take();

        assert_eq!(report.published, 1);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ProposalEvent::Published(p) if p.proposal_id == 200));
        assert_eq!(h.store.add_calls(), 1);
        assert_eq!(h.store.len(), 1);
        assert!(h.reconciler.book().contains(200));
    }

    #[test]
    fn second_cycle_with_unchanged_remote_is_silent() {
        let mut h = harness(vec![raw_proposal(1, "open")]);
        h.portal.set_open(vec![raw_proposal(1, "open"), raw_proposal(2, "open")]);

        h.reconciler.run_cycle_at(now()).unwrap();
        h.sink.take();

        let report = h.reconciler.run_cycle_at(now()).unwrap();
        assert_eq!(report.events(), 0);
        assert!(h.sink.take().is_empty());
    }

    #[test]
    fn vote_change_emits_updated_with_only_changed_field() {
        let mut h = harness(vec![with_field(raw_proposal(5, "open"), "voteYes", 100)]);
        h.portal.set_open(vec![with_field(raw_proposal(5, "open"), "voteYes", 150)]);

        h.reconciler.run_cycle_at(now()).unwrap();
        let events = h.sink.take();

        assert_eq!(events.len(), 1);
        let ProposalEvent::Updated { changes, proposal } = &events[0] else {
            panic!("expected Updated, got {:?}", events[0]);
        };
        assert_eq!(changes.len(), 1);
        let change = &changes[&TrackedField::VoteYes];
        assert_eq!(change.before, FieldValue::Tally(Tally::Value(100.0)));
        assert_eq!(change.now, FieldValue::Tally(Tally::Value(150.0)));
        assert_eq!(proposal.vote_yes, Tally::Value(150.0));

        let stored = Proposal::from_raw(&h.store.get_proposal(5).unwrap().unwrap()).unwrap();
        assert_eq!(stored.vote_yes, Tally::Value(150.0));
    }

    #[test]
    fn sentinel_to_value_is_a_change_but_sentinel_to_sentinel_is_not() {
        let mut h = harness(vec![raw_proposal(5, "open")]);
        h.portal.set_open(vec![raw_proposal(5, "open")]);
        h.reconciler.run_cycle_at(now()).unwrap();
        assert!(h.sink.take().is_empty());

        h.portal.set_open(vec![with_field(raw_proposal(5, "open"), "voteNo", 5.0)]);
        h.reconciler.run_cycle_at(now()).unwrap();
        let events = h.sink.take();
        assert_eq!(RecordingSink::kinds(&events), vec!["updated"]);
    }

    #[test]
    fn display_only_changes_are_stored_silently() {
        let mut h = harness(vec![raw_proposal(5, "open")]);
        h.portal.set_open(vec![
            with_field(with_field(raw_proposal(5, "open"), "percentYes", 42.5), "amountUSD", 1800.0),
        ]);

        let report = h.reconciler.run_cycle_at(now()).unwrap();
        assert_eq!(report.events(), 0);
        assert!(h.sink.take().is_empty());

        let stored = Proposal::from_raw(&h.store.get_proposal(5).unwrap().unwrap()).unwrap();
        assert_eq!(stored.percent_yes, Tally::Value(42.5));
        assert_eq!(stored.amount_usd, 1800.0);
    }

    #[test]
    fn reminder_fires_once_across_cycles() {
        let closing = with_field(raw_proposal(9, "open"), "votingDeadline", "2030-01-02T00:00:00");
        let mut h = harness(vec![closing.clone()]);
        h.portal.set_open(vec![closing]);

        let mut reminders = 0;
        for hour in 0..5 {
            let at = now() + chrono::Duration::hours(hour);
            reminders += h.reconciler.run_cycle_at(at).unwrap().reminded;
        }
        let events = h.sink.take();

        assert_eq!(reminders, 1);
        assert_eq!(RecordingSink::kinds(&events), vec!["reminder"]);
        let stored = Proposal::from_raw(&h.store.get_proposal(9).unwrap().unwrap()).unwrap();
        assert!(stored.reminder());
    }

    #[test]
    fn reminder_waits_for_window() {
        let closing = with_field(raw_proposal(9, "open"), "votingDeadline", "2030-01-05T00:00:00");
        let mut h = harness(vec![closing.clone()]);
        h.portal.set_open(vec![closing]);

        assert_eq!(h.reconciler.run_cycle_at(now()).unwrap().reminded, 0);
        let later = now() + chrono::Duration::days(3) + chrono::Duration::hours(1);
        assert_eq!(h.reconciler.run_cycle_at(later).unwrap().reminded, 1);
    }

    #[test]
    fn unparseable_deadline_never_reminds() {
        let odd = with_field(raw_proposal(9, "open"), "votingDeadline", "soon");
        let mut h = harness(vec![odd.clone()]);
        h.portal.set_open(vec![odd]);

        assert_eq!(h.reconciler.run_cycle_at(now()).unwrap().reminded, 0);
    }

    #[test]
    fn disappeared_proposal_ends_once() {
        let mut h = harness(vec![raw_proposal(7, "open")]);
        h.portal.set_open(vec![]);
        h.portal.set_detail(7, with_field(raw_proposal(7, "completed"), "currentStatus", "yes"));

        let report = h.reconciler.run_cycle_at(now()).unwrap();
        let events = h.sink.take();

        assert_eq!(report.ended, 1);
        assert_eq!(RecordingSink::kinds(&events), vec!["ended"]);
        let ProposalEvent::Ended(ended) = &events[0] else { unreachable!() };
        assert_eq!(ended.status, "completed");

        let report = h.reconciler.run_cycle_at(now()).unwrap();
        assert_eq!(report.events(), 0);
        assert!(h.sink.take().is_empty());
        assert_eq!(h.portal.detail_calls(), vec![7]);
    }

    #[test]
    fn ended_proposal_keeps_sticky_flags() {
        let mut h = harness(vec![raw_proposal(7, "open")]);
        h.reconciler.book().mark_published(7, Channel::Gab).unwrap();
        h.portal.set_detail(7, raw_proposal(7, "allocated"));

        h.reconciler.run_cycle_at(now()).unwrap();

        let ended = h.reconciler.book().get_proposal(7).unwrap();
        assert!(ended.is_allocated());
        assert!(ended.is_published_on(Channel::Gab));
    }

    #[test]
    fn detail_still_open_does_not_end() {
        let mut h = harness(vec![raw_proposal(7, "open")]);
        h.portal.set_detail(7, raw_proposal(7, "open"));

        let report = h.reconciler.run_cycle_at(now()).unwrap();
        assert_eq!(report.ended, 0);
        assert_eq!(report.errors, 1);
        assert_eq!(RecordingSink::kinds(&h.sink.take()), vec!["error"]);
        assert!(h.reconciler.book().get_proposal(7).unwrap().is_open());
    }

    #[test]
    fn detail_stuck_open_spends_attempt_budget() {
        let policy = ReconcileConfig { max_detail_attempts: 2, ..Default::default() };
        let mut h = harness_with(policy, vec![raw_proposal(7, "open")]);
        h.portal.set_detail(7, raw_proposal(7, "open"));

        for _ in 0..4 {
            h.reconciler.run_cycle_at(now()).unwrap();
        }

        assert_eq!(h.portal.detail_calls(), vec![7, 7]);
        assert_eq!(RecordingSink::kinds(&h.sink.take()), vec!["error", "error"]);
        assert_eq!(h.reconciler.stale_proposals(), vec![7]);
    }

    #[test]
    fn detail_failure_retries_then_goes_stale() {
        let policy = ReconcileConfig { max_detail_attempts: 3, ..Default::default() };
        let mut h = harness_with(policy, vec![raw_proposal(7, "open")]);
        h.portal.fail_detail(true);

        for _ in 0..5 {
            h.reconciler.run_cycle_at(now()).unwrap();
        }
        let events = h.sink.take();

        assert_eq!(h.portal.detail_calls(), vec![7, 7, 7]);
        assert_eq!(RecordingSink::kinds(&events), vec!["error", "error"]);
        assert_eq!(h.reconciler.stale_proposals(), vec![7]);
        assert!(h.reconciler.book().get_proposal(7).unwrap().is_open());
    }

    #[test]
    fn detail_recovers_before_budget_is_spent() {
        let mut h = harness(vec![raw_proposal(7, "open")]);
        h.portal.fail_detail(true);
        h.reconciler.run_cycle_at(now()).unwrap();

        h.portal.fail_detail(false);
        h.portal.set_detail(7, raw_proposal(7, "not-funded"));
        let report = h.reconciler.run_cycle_at(now()).unwrap();

        assert_eq!(report.ended, 1);
        assert_eq!(RecordingSink::kinds(&h.sink.take()), vec!["error", "ended"]);
    }

    #[test]
    fn open_fetch_failure_aborts_and_is_surfaced_once() {
        let mut h = harness(vec![raw_proposal(1, "open")]);
        h.portal.fail_open(true);

        assert!(h.reconciler.run_cycle_at(now()).is_err());
        assert!(h.reconciler.run_cycle_at(now()).is_err());
        assert_eq!(RecordingSink::kinds(&h.sink.take()), vec!["error"]);
        assert!(h.portal.detail_calls().is_empty());

        h.portal.fail_open(false);
        h.portal.set_open(vec![raw_proposal(1, "open")]);
        assert!(h.reconciler.run_cycle_at(now()).is_ok());
    }

    #[test]
    fn malformed_open_entries_are_skipped() {
        let mut broken = raw_proposal(3, "open");
        broken.remove("title");
        let mut h = harness(vec![]);
        h.portal.set_open(vec![broken, raw_proposal(4, "open")]);

        let report = h.reconciler.run_cycle_at(now()).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.published, 1);
        assert!(!h.reconciler.book().contains(3));
    }

    #[test]
    fn unreadable_open_entries_count_as_skipped() {
        let mut h = harness(vec![]);
        h.portal.set_open(vec![raw_proposal(4, "open")]);
        h.portal.set_rejected(2);

        let report = h.reconciler.run_cycle_at(now()).unwrap();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.open, 1);
        assert_eq!(report.published, 1);
    }

    #[test]
    fn hydrate_skips_bad_rows_and_surfaces_invalid_state() {
        let mut missing = raw_proposal(2, "open");
        missing.remove("owner");
        let h = harness(vec![raw_proposal(1, "open"), missing, raw_proposal(3, "archived")]);

        assert_eq!(h.reconciler.book().len(), 1);
        let events = h.sink.take();
        assert_eq!(events, vec![ProposalEvent::Error("Invalid proposal state - archived".into())]);
    }

    #[test]
    fn reappearing_row_skipped_at_startup_is_overwritten_not_duplicated() {
        let mut missing = raw_proposal(2, "open");
        missing.remove("owner");
        let mut h = harness(vec![missing]);
        h.portal.set_open(vec![raw_proposal(2, "open")]);

        let report = h.reconciler.run_cycle_at(now()).unwrap();
        assert_eq!(report.published, 1);
        assert_eq!(report.errors, 0);
        assert!(Proposal::from_raw(&h.store.get_proposal(2).unwrap().unwrap()).is_ok());
    }
}
