//! Importación de familias y estudiantes desde JSON
//!
//! Formato: `{ "families": [...], "students": [...] }` en camelCase. También se
//! aceptan `{ "Students": [...] }` y un array de estudiantes en la raíz. Los
//! estudiantes se vinculan a su familia por `familyId` y, si no, por
//! tutor + dirección.
//!
//! Los duplicados (en el propio documento o ya guardados) se omiten con un
//! aviso; un registro conflictivo nunca aborta la importación.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Family, Student};
use crate::repositories::TransportRepository;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::resilience::{execute_with_resilience, RetryPolicy};

const DEFAULT_STATE: &str = "CO";

lazy_static! {
    static ref TRAILING_ZIP: Regex = Regex::new(r"\b(\d{5})(?:-\d{4})?\s*$").unwrap();
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportDocument {
    #[serde(default, alias = "Families")]
    pub families: Vec<FamilyRecord>,
    #[serde(default, alias = "Students")]
    pub students: Vec<StudentRecord>,
}

/// Formas de entrada admitidas
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportInput {
    Students(Vec<StudentRecord>),
    Document(ImportDocument),
}

impl From<ImportInput> for ImportDocument {
    fn from(input: ImportInput) -> Self {
        match input {
            ImportInput::Students(students) => ImportDocument {
                families: Vec::new(),
                students,
            },
            ImportInput::Document(document) => document,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyRecord {
    /// Número o texto; solo se usa para enlazar estudiantes
    pub id: Option<serde_json::Value>,
    pub parent_guardian: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
    pub zip: Option<String>,
    pub home_phone: Option<String>,
    pub cell_phone: Option<String>,
    pub emergency_contact: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub family_id: Option<serde_json::Value>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub student_name: Option<String>,
    pub student_number: Option<String>,
    pub grade: Option<String>,
    pub school: Option<String>,
    pub parent_guardian: Option<String>,
    #[serde(alias = "address")]
    pub home_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub home_phone: Option<String>,
    pub emergency_phone: Option<String>,
    pub medical_notes: Option<String>,
    pub transportation_notes: Option<String>,
}

impl StudentRecord {
    /// `firstName lastName`, o `studentName` si no vienen separados
    pub fn full_name(&self) -> Option<String> {
        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !joined.is_empty() {
            return Some(joined);
        }
        self.student_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub families_imported: usize,
    pub families_skipped: usize,
    pub students_imported: usize,
    pub students_skipped: usize,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct ImportService {
    repository: Arc<dyn TransportRepository>,
    retry_policy: RetryPolicy,
}

/// Familia ya persistida junto con la clave con la que la referencia el JSON
struct ImportedFamily {
    key: Option<String>,
    family: Family,
}

impl ImportService {
    pub fn new(repository: Arc<dyn TransportRepository>, retry_policy: RetryPolicy) -> Self {
        Self {
            repository,
            retry_policy,
        }
    }

    pub async fn import_from_file(&self, path: &Path) -> AppResult<ImportSummary> {
        info!("📥 Importando datos desde {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        self.import_from_json(&content).await
    }

    pub async fn import_from_json(&self, content: &str) -> AppResult<ImportSummary> {
        let input: ImportInput = serde_json::from_str(content)?;
        self.import_document(input.into()).await
    }

    pub async fn import_document(&self, document: ImportDocument) -> AppResult<ImportSummary> {
        let mut summary = ImportSummary::default();
        let existing_families = self.repository.list_families().await?;
        let mut families: Vec<ImportedFamily> = Vec::new();

        for record in document.families {
            let (Some(parent), Some(address), Some(city), Some(county)) = (
                required(&record.parent_guardian),
                required(&record.address),
                required(&record.city),
                required(&record.county),
            ) else {
                let reason = format!(
                    "Family {} skipped: parentGuardian, address, city and county are required",
                    record.parent_guardian.as_deref().unwrap_or("<unnamed>")
                );
                warn!("⚠️ {}", reason);
                summary.warnings.push(reason);
                summary.families_skipped += 1;
                continue;
            };

            let key = record.id.as_ref().and_then(json_key);
            let same_family = |f: &Family| {
                f.parent_guardian.eq_ignore_ascii_case(parent) && f.address.eq_ignore_ascii_case(address)
            };
            if let Some(found) = existing_families
                .iter()
                .chain(families.iter().map(|f| &f.family))
                .find(|f| same_family(*f))
                .cloned()
            {
                debug!("👪 Familia ya existente: {} en {}", parent, address);
                summary.families_skipped += 1;
                families.push(ImportedFamily { key, family: found });
                continue;
            }

            let family = Family {
                id: Uuid::new_v4(),
                parent_guardian: parent.to_string(),
                address: address.to_string(),
                city: city.to_string(),
                state: Some(
                    required(&record.state)
                        .unwrap_or(DEFAULT_STATE)
                        .to_string(),
                ),
                county: county.to_string(),
                zip: required(&record.zip)
                    .map(str::to_string)
                    .or_else(|| extract_zip(address)),
                home_phone: record.home_phone.clone(),
                cell_phone: record.cell_phone.clone(),
                emergency_contact: record.emergency_contact.clone(),
                created_at: Utc::now(),
            };

            let created = execute_with_resilience("import_family", &self.retry_policy, || {
                self.repository.insert_family(&family)
            })
            .await?;
            summary.families_imported += 1;
            families.push(ImportedFamily { key, family: created });
        }

        let mut seen_numbers: HashSet<String> = HashSet::new();
        let mut seen_students: HashSet<(String, Option<String>)> = HashSet::new();

        for record in document.students {
            let Some(name) = record.full_name() else {
                summary.warnings.push("Student without a name skipped".to_string());
                summary.students_skipped += 1;
                continue;
            };

            let family = find_family(&families, &record);
            if family.is_none() {
                let message = format!("Student {} imported without a family", name);
                warn!("⚠️ {}", message);
                summary.warnings.push(message);
            }

            let student = build_student(name, &record, family);
            let identity = (
                student.student_name.to_lowercase(),
                student.home_address.as_deref().map(str::to_lowercase),
            );
            if seen_students.contains(&identity)
                || self
                    .repository
                    .find_student_by_name_and_address(&student.student_name, student.home_address.as_deref())
                    .await?
                    .is_some()
            {
                debug!("🎒 Estudiante ya existente: {}", student.student_name);
                summary.students_skipped += 1;
                continue;
            }

            if let Some(number) = &student.student_number {
                if seen_numbers.contains(number)
                    || self.repository.student_number_exists(number, None).await?
                {
                    skip_student(
                        &mut summary,
                        format!("Student {} skipped: student number {} already exists", student.student_name, number),
                    );
                    continue;
                }
            }

            let inserted = execute_with_resilience("import_student", &self.retry_policy, || {
                self.repository.insert_student(&student)
            })
            .await;
            match inserted {
                Ok(_) => {}
                Err(AppError::Conflict(message)) => {
                    skip_student(&mut summary, format!("Student {} skipped: {}", student.student_name, message));
                    continue;
                }
                Err(e) => return Err(e),
            }

            if let Some(number) = student.student_number.clone() {
                seen_numbers.insert(number);
            }
            seen_students.insert(identity);
            summary.students_imported += 1;
        }

        info!(
            "✅ Importación completada: {} familias, {} estudiantes ({} familias y {} estudiantes omitidos)",
            summary.families_imported,
            summary.students_imported,
            summary.families_skipped,
            summary.students_skipped
        );
        Ok(summary)
    }
}

fn skip_student(summary: &mut ImportSummary, reason: String) {
    warn!("⚠️ {}", reason);
    summary.warnings.push(reason);
    summary.students_skipped += 1;
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn json_key(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn extract_zip(address: &str) -> Option<String> {
    TRAILING_ZIP
        .captures(address)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn find_family<'a>(families: &'a [ImportedFamily], record: &StudentRecord) -> Option<&'a Family> {
    if let Some(key) = record.family_id.as_ref().and_then(json_key) {
        if let Some(found) = families.iter().find(|f| f.key.as_deref() == Some(key.as_str())) {
            return Some(&found.family);
        }
    }

    let parent = required(&record.parent_guardian)?;
    let address = required(&record.home_address)?;
    families
        .iter()
        .map(|f| &f.family)
        .find(|f| f.parent_guardian.eq_ignore_ascii_case(parent) && f.address.eq_ignore_ascii_case(address))
}

fn build_student(name: String, record: &StudentRecord, family: Option<&Family>) -> Student {
    let mut student = Student::new(name);
    student.student_number = required(&record.student_number).map(str::to_string);
    student.grade = required(&record.grade).map(str::to_string);
    student.school = record.school.clone();
    student.medical_notes = record.medical_notes.clone();
    student.transportation_notes = record.transportation_notes.clone();

    match family {
        Some(family) => {
            student.family_id = Some(family.id);
            student.parent_guardian = Some(family.parent_guardian.clone());
            student.home_address = Some(family.address.clone());
            student.city = Some(family.city.clone());
            student.state = family.state.clone();
            student.zip = family.zip.clone();
            student.home_phone = family.home_phone.clone();
            student.emergency_phone = family
                .cell_phone
                .clone()
                .or_else(|| family.home_phone.clone());
        }
        None => {
            student.parent_guardian = record.parent_guardian.clone();
            student.home_address = required(&record.home_address).map(str::to_string);
            student.city = record.city.clone();
            student.state = Some(required(&record.state).unwrap_or(DEFAULT_STATE).to_string());
            student.zip = required(&record.zip)
                .map(str::to_string)
                .or_else(|| student.home_address.as_deref().and_then(extract_zip));
            student.home_phone = record.home_phone.clone();
            student.emergency_phone = record.emergency_phone.clone();
        }
    }
    student
}
