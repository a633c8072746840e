//! Migration workflow state machine
//!
//! The workflow never talks to the server itself: [`MigrationWorkflow::update`]
//! consumes a [`Msg`] (operator action or server response) and returns the
//! [`Command`] to execute next. Responses are fed back as messages.

use log::{debug, info, warn};

use super::builder::{SelectionSet, needs_referenced_templates};
use super::conflicts::{ConflictQueue, is_version_conflict};
use super::report::{MigrationReport, build_report};
use super::types::Component;
use crate::api::models::{
    ConflictDescriptor, ConflictDetail, ConflictDetailRequest, MigrationPayload, MigrationResult,
};
use crate::api::version::display_version;

/// Everything needed to start a migration
#[derive(Debug, Clone)]
pub struct MigrationRequest {
    pub source_system: String,
    pub destination_system: String,
    pub selection: SelectionSet,
    pub include_referenced_templates: bool,
}

/// Source and destination run different Mirth versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflict {
    pub source_version: String,
    pub destination_version: String,
}

#[derive(Debug, Clone)]
pub struct ComponentConflict {
    pub detail: ConflictDetail,
    /// Conflicts still queued, including this one
    pub remaining: usize,
}

#[derive(Debug, Clone)]
pub enum WorkflowState {
    Idle,
    CollectingReferences,
    AwaitingConflictCheck,
    LoadingConflict,
    PresentingVersionConflict(VersionConflict),
    PresentingComponentConflict(ComponentConflict),
    Migrating,
    /// Report shown until acknowledged
    Done(MigrationReport),
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CollectingReferences => "collecting references",
            Self::AwaitingConflictCheck => "awaiting conflict check",
            Self::LoadingConflict => "loading conflict",
            Self::PresentingVersionConflict(_) => "presenting version conflict",
            Self::PresentingComponentConflict(_) => "presenting component conflict",
            Self::Migrating => "migrating",
            Self::Done(_) => "done",
        }
    }

    pub fn is_presenting(&self) -> bool {
        matches!(
            self,
            Self::PresentingVersionConflict(_) | Self::PresentingComponentConflict(_)
        )
    }

    /// Waiting for a server response
    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            Self::CollectingReferences | Self::AwaitingConflictCheck | Self::LoadingConflict | Self::Migrating
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    MigrateAnyway,
    Skip,
}

#[derive(Debug, Clone)]
pub enum Msg {
    Start(MigrationRequest),
    ReferencedTemplatesLoaded(Vec<Component>),
    ConflictsDetected(Vec<ConflictDescriptor>),
    ConflictLoaded(ConflictDetail),
    Resolve {
        resolution: Resolution,
        apply_to_all: bool,
    },
    Cancel,
    MigrationFinished(MigrationResult),
    /// A workflow call failed for a reason other than authentication
    CallFailed,
    Acknowledge,
}

#[derive(Debug, Clone)]
pub enum Command {
    None,
    NothingSelected,
    FetchReferencedTemplates(MigrationPayload),
    CheckConflicts(MigrationPayload),
    LoadConflict(ConflictDetailRequest),
    Migrate(MigrationPayload),
    RefreshTables,
}

#[derive(Debug, Clone)]
pub struct MigrationWorkflow {
    state: WorkflowState,
    source_system: String,
    destination_system: String,
    selection: SelectionSet,
    skipped: Vec<Component>,
    queue: ConflictQueue,
}

impl Default for MigrationWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationWorkflow {
    pub fn new() -> Self {
        Self {
            state: WorkflowState::Idle,
            source_system: String::new(),
            destination_system: String::new(),
            selection: SelectionSet::new(),
            skipped: Vec::new(),
            queue: ConflictQueue::default(),
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn skipped(&self) -> &[Component] {
        &self.skipped
    }

    pub fn queue(&self) -> &ConflictQueue {
        &self.queue
    }

    fn transition(&mut self, state: WorkflowState) {
        debug!("Migration workflow: {} -> {}", self.state.name(), state.name());
        self.state = state;
    }

    fn reset(&mut self) {
        self.selection.clear();
        self.skipped.clear();
        self.queue.clear();
        self.transition(WorkflowState::Idle);
    }

    fn payload(&self) -> MigrationPayload {
        MigrationPayload {
            source_system: self.source_system.clone(),
            destination_system: self.destination_system.clone(),
            component: self.selection.to_vec(),
        }
    }

    pub fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Start(request) if matches!(self.state, WorkflowState::Idle) => self.start(request),

            Msg::ReferencedTemplatesLoaded(templates)
                if matches!(self.state, WorkflowState::CollectingReferences) =>
            {
                let added = self.selection.merge(templates);
                info!("Added {} referenced code template(s)", added);
                self.transition(WorkflowState::AwaitingConflictCheck);
                Command::CheckConflicts(self.payload())
            }

            Msg::ConflictsDetected(conflicts)
                if matches!(self.state, WorkflowState::AwaitingConflictCheck) =>
            {
                info!("Server reported {} conflict(s)", conflicts.len());
                self.queue = ConflictQueue::new(conflicts);
                self.advance()
            }

            Msg::ConflictLoaded(detail) if matches!(self.state, WorkflowState::LoadingConflict) => {
                self.present(detail);
                Command::None
            }

            Msg::Resolve {
                resolution,
                apply_to_all,
            } if self.state.is_presenting() => self.resolve(resolution, apply_to_all),

            Msg::Cancel if self.state.is_presenting() => {
                info!("Migration cancelled");
                self.reset();
                Command::None
            }

            Msg::MigrationFinished(result) if matches!(self.state, WorkflowState::Migrating) => {
                let report = build_report(&result.success, &result.failure, &self.skipped)
                    .with_systems(self.source_system.clone(), self.destination_system.clone());
                info!(
                    "Migration finished: {} succeeded, {} failed, {} skipped",
                    result.success.len(),
                    result.failure.len(),
                    self.skipped.len()
                );
                self.selection.clear();
                self.skipped.clear();
                self.queue.clear();
                self.transition(WorkflowState::Done(report));
                Command::None
            }

            Msg::CallFailed if self.state.is_waiting() => {
                warn!("Migration aborted while {}", self.state.name());
                self.reset();
                Command::None
            }

            Msg::Acknowledge if matches!(self.state, WorkflowState::Done(_)) => {
                self.transition(WorkflowState::Idle);
                Command::RefreshTables
            }

            other => {
                debug!("Ignoring {} while {}", msg_name(&other), self.state.name());
                Command::None
            }
        }
    }

    fn start(&mut self, request: MigrationRequest) -> Command {
        if request.selection.is_empty() {
            return Command::NothingSelected;
        }

        self.source_system = request.source_system;
        self.destination_system = request.destination_system;
        self.selection = request.selection;
        self.skipped.clear();
        self.queue.clear();
        info!(
            "Migrating {} component(s) from {} to {}",
            self.selection.len(),
            self.source_system,
            self.destination_system
        );

        if needs_referenced_templates(&self.selection, request.include_referenced_templates) {
            self.transition(WorkflowState::CollectingReferences);
            Command::FetchReferencedTemplates(self.payload())
        } else {
            self.transition(WorkflowState::AwaitingConflictCheck);
            Command::CheckConflicts(self.payload())
        }
    }

    /// Present the next conflict, or migrate once none are left
    fn advance(&mut self) -> Command {
        if let Some(head) = self.queue.head() {
            let request = ConflictDetailRequest {
                source_system: self.source_system.clone(),
                destination_system: self.destination_system.clone(),
                component: head.clone(),
            };
            self.transition(WorkflowState::LoadingConflict);
            return Command::LoadConflict(request);
        }

        if self.selection.is_empty() {
            info!("Nothing left to migrate");
            self.reset();
            return Command::RefreshTables;
        }

        self.transition(WorkflowState::Migrating);
        Command::Migrate(self.payload())
    }

    fn present(&mut self, detail: ConflictDetail) {
        if is_version_conflict(&detail.id) {
            let versions = detail.conflicts.first();
            let version = |raw: Option<&String>| {
                raw.map(|v| display_version(v))
                    .unwrap_or_else(|| "unknown".to_string())
            };
            let conflict = VersionConflict {
                source_version: version(versions.and_then(|c| c.source_mirth_version.as_ref())),
                destination_version: version(versions.and_then(|c| c.destination_mirth_version.as_ref())),
            };
            self.transition(WorkflowState::PresentingVersionConflict(conflict));
        } else {
            let remaining = self.queue.len();
            self.transition(WorkflowState::PresentingComponentConflict(ComponentConflict {
                detail,
                remaining,
            }));
        }
    }

    fn resolve(&mut self, resolution: Resolution, apply_to_all: bool) -> Command {
        let version_conflict = matches!(self.state, WorkflowState::PresentingVersionConflict(_));

        match resolution {
            Resolution::Skip if version_conflict => {
                warn!("A version conflict can only be accepted or cancelled");
                return Command::None;
            }
            Resolution::MigrateAnyway if apply_to_all => {
                self.queue.clear();
            }
            Resolution::MigrateAnyway => {
                self.queue.pop_head();
            }
            Resolution::Skip => {
                let conflicts = if apply_to_all {
                    self.queue.drain()
                } else {
                    self.queue.pop_head().into_iter().collect()
                };
                for conflict in conflicts {
                    self.skip(&conflict);
                }
            }
        }

        self.advance()
    }

    fn skip(&mut self, conflict: &ConflictDescriptor) {
        let component = self
            .selection
            .remove(&conflict.id)
            .unwrap_or_else(|| conflict.to_component());
        debug!("Skipping {} '{}'", component.component_type.label(), component.name);
        self.skipped.push(component.skipped());
    }
}

fn msg_name(msg: &Msg) -> &'static str {
    match msg {
        Msg::Start(_) => "start",
        Msg::ReferencedTemplatesLoaded(_) => "referenced templates",
        Msg::ConflictsDetected(_) => "conflict list",
        Msg::ConflictLoaded(_) => "conflict detail",
        Msg::Resolve { .. } => "resolution",
        Msg::Cancel => "cancel",
        Msg::MigrationFinished(_) => "migration result",
        Msg::CallFailed => "call failure",
        Msg::Acknowledge => "acknowledge",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{ConflictEntry, MigratedComponent};
    use crate::migration::builder::build_selection_set;
    use crate::migration::types::{ComponentStatus, ComponentType, Row};
    use serde_json::Map;

    const SENTINEL: &str = "00000000-0000-0000-0000-000000000000";

    fn channel_table() -> Vec<Row> {
        vec![
            Row::new("g1", "Inbound", ComponentType::ChannelGroup),
            Row::new("ch1", "CH1", ComponentType::Channel),
            Row::new("ch2", "CH2", ComponentType::Channel),
        ]
    }

    fn request(selection: SelectionSet) -> MigrationRequest {
        MigrationRequest {
            source_system: "dev".to_string(),
            destination_system: "prod".to_string(),
            selection,
            include_referenced_templates: false,
        }
    }

    fn descriptor(id: &str, name: &str) -> ConflictDescriptor {
        ConflictDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            component_type: ComponentType::Channel,
            extra: Map::new(),
        }
    }

    fn detail(id: &str, name: &str) -> ConflictDetail {
        ConflictDetail {
            id: id.to_string(),
            name: name.to_string(),
            component_type: ComponentType::Channel,
            conflicts: vec![ConflictEntry {
                conflict_message: Some("A channel with this name already exists".to_string()),
                ..Default::default()
            }],
            number_of_conflicts: Some(1),
            meta_data: None,
            source_content: None,
            destination_content: None,
        }
    }

    fn version_detail() -> ConflictDetail {
        ConflictDetail {
            id: SENTINEL.to_string(),
            name: String::new(),
            component_type: ComponentType::Unknown,
            conflicts: vec![ConflictEntry {
                conflict_message: None,
                source_mirth_version: Some("3.4.2.8029".to_string()),
                destination_mirth_version: Some("4.5.0.3123".to_string()),
            }],
            number_of_conflicts: Some(1),
            meta_data: None,
            source_content: None,
            destination_content: None,
        }
    }

    fn migrated(name: &str) -> MigratedComponent {
        MigratedComponent {
            name: name.to_string(),
            component_type: ComponentType::Channel,
            id: None,
            error_code: None,
            error_message: None,
            function: Vec::new(),
        }
    }

    fn started(conflicts: Vec<ConflictDescriptor>) -> (MigrationWorkflow, Command) {
        let mut workflow = MigrationWorkflow::new();
        let selection = build_selection_set(&channel_table(), &[0]);
        workflow.update(Msg::Start(request(selection)));
        let command = workflow.update(Msg::ConflictsDetected(conflicts));
        (workflow, command)
    }

    fn component_ids(payload: &MigrationPayload) -> Vec<&str> {
        payload.component.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_skipping_a_conflict_migrates_the_rest() {
        let mut workflow = MigrationWorkflow::new();
        let selection = build_selection_set(&channel_table(), &[0]);

        let command = workflow.update(Msg::Start(request(selection)));
        let Command::CheckConflicts(payload) = command else {
            panic!("expected conflict check, got {:?}", command);
        };
        assert_eq!(component_ids(&payload), vec!["ch1", "ch2"]);

        let command = workflow.update(Msg::ConflictsDetected(vec![descriptor("ch1", "CH1")]));
        let Command::LoadConflict(request) = command else {
            panic!("expected conflict detail request, got {:?}", command);
        };
        assert_eq!(request.component.id, "ch1");

        workflow.update(Msg::ConflictLoaded(detail("ch1", "CH1")));
        assert!(matches!(workflow.state(), WorkflowState::PresentingComponentConflict(_)));

        let command = workflow.update(Msg::Resolve {
            resolution: Resolution::Skip,
            apply_to_all: false,
        });
        let Command::Migrate(payload) = command else {
            panic!("expected migration, got {:?}", command);
        };
        assert_eq!(component_ids(&payload), vec!["ch2"]);

        workflow.update(Msg::MigrationFinished(MigrationResult {
            success: vec![migrated("CH2")],
            failure: vec![],
        }));
        let WorkflowState::Done(report) = workflow.state() else {
            panic!("expected report");
        };
        let statuses: Vec<_> = report.entries().map(|e| (e.name.as_str(), e.status)).collect();
        assert_eq!(
            statuses,
            vec![("CH1", ComponentStatus::Skipped), ("CH2", ComponentStatus::Success)]
        );
        assert!(workflow.selection().is_empty());
        assert!(workflow.skipped().is_empty());

        assert!(matches!(workflow.update(Msg::Acknowledge), Command::RefreshTables));
        assert!(matches!(workflow.state(), WorkflowState::Idle));
    }

    #[test]
    fn test_version_conflict_presented_first() {
        let (mut workflow, command) = started(vec![descriptor("ch2", "CH2"), descriptor(SENTINEL, "")]);
        let Command::LoadConflict(request) = command else {
            panic!("expected conflict detail request");
        };
        assert_eq!(request.component.id, SENTINEL);

        workflow.update(Msg::ConflictLoaded(version_detail()));
        let WorkflowState::PresentingVersionConflict(conflict) = workflow.state() else {
            panic!("expected version conflict");
        };
        assert_eq!(conflict.source_version, "3.4.2");
        assert_eq!(conflict.destination_version, "4.5.0");

        // Skip does not apply to a version conflict
        assert!(matches!(
            workflow.update(Msg::Resolve {
                resolution: Resolution::Skip,
                apply_to_all: false
            }),
            Command::None
        ));

        let command = workflow.update(Msg::Resolve {
            resolution: Resolution::MigrateAnyway,
            apply_to_all: false,
        });
        let Command::LoadConflict(request) = command else {
            panic!("expected next conflict, got {:?}", command);
        };
        assert_eq!(request.component.id, "ch2");
    }

    #[test]
    fn test_migrate_anyway_drains_queue_one_head_at_a_time() {
        let conflicts: Vec<_> = (0..4).map(|i| descriptor(&format!("x{}", i), "X")).collect();
        let (mut workflow, _) = started(conflicts);

        let mut invocations = 0;
        loop {
            workflow.update(Msg::ConflictLoaded(detail("x", "X")));
            let before = workflow.queue().len();
            let command = workflow.update(Msg::Resolve {
                resolution: Resolution::MigrateAnyway,
                apply_to_all: false,
            });
            invocations += 1;
            assert_eq!(workflow.queue().len(), before - 1);
            if matches!(command, Command::Migrate(_)) {
                break;
            }
        }
        assert_eq!(invocations, 4);
        assert!(matches!(workflow.state(), WorkflowState::Migrating));
    }

    #[test]
    fn test_migrate_anyway_for_all() {
        let (mut workflow, _) = started(vec![descriptor("ch1", "CH1"), descriptor("ch2", "CH2")]);
        workflow.update(Msg::ConflictLoaded(detail("ch1", "CH1")));

        let command = workflow.update(Msg::Resolve {
            resolution: Resolution::MigrateAnyway,
            apply_to_all: true,
        });
        let Command::Migrate(payload) = command else {
            panic!("expected migration");
        };
        assert_eq!(component_ids(&payload), vec!["ch1", "ch2"]);
    }

    #[test]
    fn test_skip_all_with_nothing_left_returns_to_idle() {
        let (mut workflow, _) = started(vec![descriptor("ch1", "CH1"), descriptor("ch2", "CH2")]);
        workflow.update(Msg::ConflictLoaded(detail("ch1", "CH1")));

        let command = workflow.update(Msg::Resolve {
            resolution: Resolution::Skip,
            apply_to_all: true,
        });

        assert!(matches!(command, Command::RefreshTables));
        assert!(matches!(workflow.state(), WorkflowState::Idle));
        assert!(workflow.selection().is_empty());
    }

    #[test]
    fn test_skip_all_moves_every_queued_conflict_in_one_step() {
        let mut rows = channel_table();
        rows.push(Row::new("ch3", "CH3", ComponentType::Channel));
        let mut workflow = MigrationWorkflow::new();
        workflow.update(Msg::Start(request(build_selection_set(&rows, &[0]))));
        workflow.update(Msg::ConflictsDetected(vec![descriptor("ch1", "CH1"), descriptor("ch2", "CH2")]));
        workflow.update(Msg::ConflictLoaded(detail("ch1", "CH1")));

        let command = workflow.update(Msg::Resolve {
            resolution: Resolution::Skip,
            apply_to_all: true,
        });

        let skipped: Vec<_> = workflow.skipped().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(skipped, vec!["ch1", "ch2"]);
        assert!(workflow.queue().is_empty());
        let Command::Migrate(payload) = command else {
            panic!("expected migration, got {:?}", command);
        };
        assert_eq!(component_ids(&payload), vec!["ch3"]);

        workflow.update(Msg::MigrationFinished(MigrationResult {
            success: vec![migrated("CH3")],
            failure: vec![],
        }));
        let WorkflowState::Done(report) = workflow.state() else {
            panic!("expected report");
        };
        let statuses: Vec<_> = report.entries().map(|e| (e.name.as_str(), e.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("CH1", ComponentStatus::Skipped),
                ("CH2", ComponentStatus::Skipped),
                ("CH3", ComponentStatus::Success)
            ]
        );
    }

    #[test]
    fn test_cancel_discards_everything() {
        let (mut workflow, _) = started(vec![descriptor("ch1", "CH1"), descriptor("ch2", "CH2")]);
        workflow.update(Msg::ConflictLoaded(detail("ch1", "CH1")));
        workflow.update(Msg::Resolve {
            resolution: Resolution::Skip,
            apply_to_all: false,
        });
        workflow.update(Msg::ConflictLoaded(detail("ch2", "CH2")));

        assert!(matches!(workflow.update(Msg::Cancel), Command::None));
        assert!(matches!(workflow.state(), WorkflowState::Idle));
        assert!(workflow.selection().is_empty());
        assert!(workflow.skipped().is_empty());
        assert!(workflow.queue().is_empty());
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let mut workflow = MigrationWorkflow::new();
        let command = workflow.update(Msg::Start(request(SelectionSet::new())));
        assert!(matches!(command, Command::NothingSelected));
        assert!(matches!(workflow.state(), WorkflowState::Idle));
    }

    #[test]
    fn test_referenced_templates_merged_before_conflict_check() {
        let mut workflow = MigrationWorkflow::new();
        let mut migration = request(build_selection_set(&channel_table(), &[1]));
        migration.include_referenced_templates = true;

        let command = workflow.update(Msg::Start(migration));
        assert!(matches!(command, Command::FetchReferencedTemplates(_)));

        let command = workflow.update(Msg::ReferencedTemplatesLoaded(vec![
            Component::new("ch1", "CH1", ComponentType::Channel),
            Component::new("t1", "Helpers", ComponentType::CodeTemplate),
        ]));
        let Command::CheckConflicts(payload) = command else {
            panic!("expected conflict check");
        };
        assert_eq!(component_ids(&payload), vec!["ch1", "t1"]);
    }

    #[test]
    fn test_stale_and_out_of_place_messages_are_ignored() {
        let mut workflow = MigrationWorkflow::new();
        assert!(matches!(
            workflow.update(Msg::ConflictLoaded(detail("ch1", "CH1"))),
            Command::None
        ));
        assert!(matches!(workflow.update(Msg::Cancel), Command::None));
        assert!(matches!(
            workflow.update(Msg::MigrationFinished(MigrationResult::default())),
            Command::None
        ));
        assert!(matches!(workflow.state(), WorkflowState::Idle));

        // A second completion is not reported twice
        let (mut workflow, _) = started(vec![]);
        workflow.update(Msg::MigrationFinished(MigrationResult::default()));
        assert!(matches!(workflow.state(), WorkflowState::Done(_)));
        workflow.update(Msg::MigrationFinished(MigrationResult {
            success: vec![migrated("late")],
            failure: vec![],
        }));
        let WorkflowState::Done(report) = workflow.state() else {
            panic!("expected report");
        };
        assert!(report.is_empty());
    }

    #[test]
    fn test_failed_call_resets_workflow() {
        let (mut workflow, _) = started(vec![descriptor("ch1", "CH1")]);
        assert!(matches!(workflow.state(), WorkflowState::LoadingConflict));

        workflow.update(Msg::CallFailed);
        assert!(matches!(workflow.state(), WorkflowState::Idle));
        assert!(workflow.selection().is_empty());
        assert!(workflow.queue().is_empty());
    }
}
