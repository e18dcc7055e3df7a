// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action handlers, one module per family

mod crew;
mod mesh;
mod swarm;

use crate::action::Action;
use crate::reply::Reply;
use crate::session::MessengerSession;
use pim_core::Clock;
use pim_crew::WorkerAdapter;

impl<C: Clock + 'static, W: WorkerAdapter> MessengerSession<C, W> {
    /// Route a parsed action to its handler.
    pub(crate) async fn handle(&self, action: Action) -> Reply {
        match action {
            // -- mesh --
            Action::Join { spec } => self.handle_join(spec).await,
            Action::Status => self.handle_status(),
            Action::List => self.handle_list(),
            Action::Feed { limit } => self.handle_feed(limit),
            Action::Whois { name } => self.handle_whois(&name),
            Action::SetStatus { message } => self.handle_set_status(message),
            Action::Spec { spec } => self.handle_spec(&spec),
            Action::Send {
                to,
                message,
                reply_to,
            } => self.handle_send(&to, &message, reply_to),
            Action::Broadcast { message, reply_to } => self.handle_broadcast(&message, reply_to),
            Action::Rename { name } => self.handle_rename(&name).await,
            Action::AutoRegisterPath { op } => self.handle_auto_register_path(op),

            // -- reservations + swarm --
            Action::Reserve { paths, reason } => self.handle_reserve(paths, reason),
            Action::Release { paths } => self.handle_release(paths),
            Action::Swarm { spec } => self.handle_swarm(spec),
            Action::Claim {
                task_id,
                spec,
                reason,
            } => self.handle_claim(&task_id, spec, reason).await,
            Action::Unclaim { task_id, spec } => self.handle_unclaim(&task_id, spec).await,
            Action::Complete {
                task_id,
                spec,
                notes,
            } => self.handle_complete(&task_id, spec, notes).await,

            // -- crew --
            Action::EpicCreate { title } => self.handle_epic_create(&title).await,
            Action::EpicShow { id } => self.handle_epic_show(&id),
            Action::EpicList => self.handle_epic_list(),
            Action::EpicClose { id } => self.handle_epic_close(&id),
            Action::EpicSetSpec { id, content } => self.handle_epic_set_spec(&id, &content),
            Action::TaskCreate {
                epic,
                title,
                description,
                depends_on,
            } => {
                self.handle_task_create(&epic, &title, description, depends_on)
                    .await
            }
            Action::TaskShow { id } => self.handle_task_show(&id),
            Action::TaskList { epic } => self.handle_task_list(epic),
            Action::TaskStart { id } => self.handle_task_start(&id),
            Action::TaskDone { id, summary } => self.handle_task_done(&id, summary),
            Action::TaskBlock { id, reason } => self.handle_task_block(&id, &reason),
            Action::TaskUnblock { id } => self.handle_task_unblock(&id),
            Action::TaskReady { epic } => self.handle_task_ready(&epic),
            Action::TaskReset { id, cascade } => self.handle_task_reset(&id, cascade),
            Action::Plan { target, idea } => self.handle_plan(&target, idea).await,
            Action::Work {
                target,
                autonomous,
                concurrency,
            } => self.handle_work(&target, autonomous, concurrency).await,
            Action::Review {
                target,
                review_type,
            } => self.handle_review(&target, review_type).await,
            Action::CheckpointSave { id } => self.handle_checkpoint_save(id),
            Action::CheckpointRestore { id } => self.handle_checkpoint_restore(&id),
            Action::CheckpointDelete { id } => self.handle_checkpoint_delete(&id),
            Action::CheckpointList => self.handle_checkpoint_list(),
            Action::CrewStatus => self.handle_crew_status(),
            Action::CrewValidate { id } => self.handle_crew_validate(id),
            Action::CrewAgents => self.handle_crew_agents(),
            Action::CrewInstall => self.handle_crew_install(),
            Action::CrewUninstall => self.handle_crew_uninstall(),
        }
    }
}
