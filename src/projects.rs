//! Project attribution: Hackatime projects keyed by normalized name.
//!
//! The engine reconciles externally reported project names with local
//! `HackatimeProject` records. Names are compared trimmed and case-folded;
//! the first record with a matching name wins.
//!
//! The store has no unique constraints, so two requests ensuring the same
//! new name at once can both miss the lookup and both create a record.
//! `find_duplicate_projects` reports such pairs for reconciliation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::github::parse_github_repo;
use crate::hackatime::TimeTracker;
use crate::ledger::{AppLink, Ledger, require};
use crate::models::{App, HackatimeProject, links_to};
use crate::store::{Collection, Formula, RecordStore, RecordStoreExt, normalize_key, patch};
use crate::{Error, Result};

/// Normalize a project name for dedup: trimmed and case-folded.
pub fn normalize_project_name(name: &str) -> String {
    normalize_key(name)
}

/// Records sharing one normalized name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateProjects {
    pub normalized_name: String,
    /// Record ids, oldest first
    pub ids: Vec<String>,
}

/// One project touched by a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedProject {
    pub id: String,
    pub name: String,
    pub total_seconds: u64,
    /// Whether the sync created the local record
    pub created: bool,
}

/// Outcome of `sync_projects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub app_id: String,
    pub neighbor_id: String,
    pub synced: Vec<SyncedProject>,
    /// Projects reported with no tracked time
    pub skipped: usize,
}

impl<S: RecordStore> Ledger<S> {
    /// Return the project with this normalized name, creating it when absent.
    ///
    /// A created project is linked to `app_id` only; attribution to a
    /// neighbor is the caller's job (see [`Ledger::attribute_project`]).
    pub fn ensure_project(
        &mut self,
        name: &str,
        app_id: &str,
        neighbor_id: &str,
    ) -> Result<HackatimeProject> {
        self.ensure_project_inner(name, app_id, neighbor_id)
            .map(|(project, _)| project)
    }

    fn ensure_project_inner(
        &mut self,
        name: &str,
        app_id: &str,
        neighbor_id: &str,
    ) -> Result<(HackatimeProject, bool)> {
        require("project name", name)?;
        require("app id", app_id)?;

        let lookup = Formula::normalized_eq("name", name);
        if let Some(existing) = self.store.find_first::<HackatimeProject>(&lookup)? {
            debug!(project = %existing.id, name, "reusing project");
            return Ok((existing, false));
        }

        let project = HackatimeProject {
            id: String::new(),
            name: name.trim().to_string(),
            github_link: None,
            neighbor: Vec::new(),
            app: vec![app_id.to_string()],
        };
        let created = self.store.insert(&project)?;
        info!(
            project = %created.id,
            name = %created.name,
            app = app_id,
            requested_by = neighbor_id,
            "created project"
        );
        Ok((created, true))
    }

    /// Link a project to a neighbor and an app, each only if not yet linked.
    pub fn attribute_project(
        &mut self,
        project_id: &str,
        neighbor_id: &str,
        app_id: &str,
    ) -> Result<HackatimeProject> {
        let mut project = self
            .store
            .fetch::<HackatimeProject>(project_id)?
            .ok_or_else(|| Error::NotFound(format!("Project not found: {}", project_id)))?;

        if !links_to(&project.neighbor, neighbor_id) {
            let mut neighbors = project.neighbor.clone();
            neighbors.push(neighbor_id.to_string());
            project = self
                .store
                .patch_entity(project_id, patch("neighbor", &neighbors)?)?;
        }
        if !links_to(&project.app, app_id) {
            let mut apps = project.app.clone();
            apps.push(app_id.to_string());
            project = self.store.patch_entity(project_id, patch("app", &apps)?)?;
        }

        self.append_app_link(app_id, AppLink::HackatimeProjects, project_id)?;
        Ok(project)
    }

    /// Group projects whose normalized names collide.
    pub fn find_duplicate_projects(&self) -> Result<Vec<DuplicateProjects>> {
        let projects = self.store.find_all::<HackatimeProject>(&Formula::All)?;

        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for project in projects {
            groups
                .entry(normalize_project_name(&project.name))
                .or_default()
                .push(project.id);
        }

        let duplicates: Vec<DuplicateProjects> = groups
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(normalized_name, ids)| DuplicateProjects {
                normalized_name,
                ids,
            })
            .collect();

        for dup in &duplicates {
            warn!(name = %dup.normalized_name, count = dup.ids.len(), "duplicate project records");
        }
        Ok(duplicates)
    }

    /// Set the GitHub repository of a project the caller is attributed to.
    pub fn link_github(
        &mut self,
        token: &str,
        project_id: &str,
        github_link: &str,
    ) -> Result<HackatimeProject> {
        require("project id", project_id)?;
        require("github link", github_link)?;
        parse_github_repo(github_link)?;

        let neighbor = self.resolve(token)?;
        let project = self
            .store
            .fetch::<HackatimeProject>(project_id)?
            .ok_or_else(|| Error::NotFound(format!("Project not found: {}", project_id)))?;

        if !links_to(&project.neighbor, &neighbor.id) {
            return Err(Error::Conflict(format!(
                "Project {} is not attributed to you",
                project_id
            )));
        }

        self.store
            .patch_entity(project_id, patch("githubLink", github_link.trim())?)
    }

    /// Delete a project nobody is attributed to, unlinking it from every app that lists it.
    pub fn delete_orphan_project(&mut self, token: &str, project_id: &str) -> Result<HackatimeProject> {
        require("project id", project_id)?;
        self.resolve(token)?;

        let project = self
            .store
            .fetch::<HackatimeProject>(project_id)?
            .ok_or_else(|| Error::NotFound(format!("Project not found: {}", project_id)))?;

        if !project.neighbor.is_empty() {
            return Err(Error::Conflict(format!(
                "Project {} is still attributed to {} neighbor(s)",
                project_id,
                project.neighbor.len()
            )));
        }

        let owners = self
            .store
            .find_all::<App>(&Formula::links(AppLink::HackatimeProjects.field(), project_id))?;
        for app in owners {
            let remaining: Vec<String> = app
                .hackatime_projects
                .iter()
                .filter(|id| *id != project_id)
                .cloned()
                .collect();
            self.write_app_link(&app.id, AppLink::HackatimeProjects, &remaining)?;
        }

        self.store.delete(Collection::HackatimeProjects, project_id)?;
        info!(project = project_id, "deleted orphan project");
        Ok(project)
    }

    /// Pull the caller's tracked projects from Hackatime and attribute each to an app.
    pub fn sync_projects(
        &mut self,
        token: &str,
        app_id: &str,
        tracker: &dyn TimeTracker,
        since: DateTime<Utc>,
    ) -> Result<SyncReport> {
        require("app id", app_id)?;

        let neighbor = self.resolve(token)?;
        let app = self.app_by_id(app_id)?;
        if !app.has_member(&neighbor.id) {
            return Err(Error::NotMember(app.id));
        }
        let slack_id = neighbor
            .slack_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                Error::InvalidInput("Neighbor has no Slack id linked to Hackatime".to_string())
            })?;

        let tracked = tracker.projects_since(slack_id, since)?;

        let mut report = SyncReport {
            app_id: app.id.clone(),
            neighbor_id: neighbor.id.clone(),
            synced: Vec::new(),
            skipped: 0,
        };
        for entry in tracked {
            if entry.total_seconds == 0 || entry.name.trim().is_empty() {
                report.skipped += 1;
                continue;
            }
            let (project, created) = self.ensure_project_inner(&entry.name, &app.id, &neighbor.id)?;
            let project = self.attribute_project(&project.id, &neighbor.id, &app.id)?;
            report.synced.push(SyncedProject {
                id: project.id,
                name: project.name,
                total_seconds: entry.total_seconds,
                created,
            });
        }

        info!(
            app = %report.app_id,
            neighbor = %report.neighbor_id,
            synced = report.synced.len(),
            skipped = report.skipped,
            "synced Hackatime projects"
        );
        Ok(report)
    }
}
