//! Servicio de reportes
//!
//! Exportaciones CSV de estudiantes y conductores y horarios de ruta en
//! texto plano, escritos en el directorio de reportes configurado.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{Bus, Driver, RoutePlan, RouteTimeSlot, Student};
use crate::repositories::TransportRepository;
use crate::services::route_service::RouteService;
use crate::utils::errors::AppResult;

const STUDENT_CSV_HEADER: &str = "Student Number,Student Name,Grade,School,Home Address,City,State,Zip,Parent/Guardian,Home Phone,Emergency Phone,Bus Stop,AM Route,PM Route,Active";
const DRIVER_CSV_HEADER: &str = "First Name,Last Name,License Number,License Expiration,Phone,Active";

#[derive(Clone)]
pub struct ReportService {
    repository: Arc<dyn TransportRepository>,
    route_service: RouteService,
    reports_dir: PathBuf,
}

impl ReportService {
    pub fn new(
        repository: Arc<dyn TransportRepository>,
        route_service: RouteService,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repository,
            route_service,
            reports_dir: reports_dir.into(),
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    pub async fn students_csv(&self) -> AppResult<String> {
        let students = self.repository.list_students().await?;
        Ok(students_to_csv(&students))
    }

    pub async fn drivers_csv(&self) -> AppResult<String> {
        let drivers = self.repository.list_drivers().await?;
        Ok(drivers_to_csv(&drivers))
    }

    pub async fn export_students_csv(&self) -> AppResult<PathBuf> {
        let content = self.students_csv().await?;
        self.write_report("students.csv", &content).await
    }

    pub async fn export_drivers_csv(&self) -> AppResult<PathBuf> {
        let content = self.drivers_csv().await?;
        self.write_report("drivers.csv", &content).await
    }

    /// Genera `Route-{Nombre}-{Fecha}-Schedule.txt` para la ruta
    pub async fn generate_route_schedule(&self, route_id: Uuid) -> AppResult<PathBuf> {
        let plan = self.route_service.load_route_plan(route_id).await?;
        let file_name = schedule_file_name(&plan.route.route_name, plan.route.route_date);
        self.write_report(&file_name, &route_schedule_text(&plan)).await
    }

    /// Genera el horario de cada ruta activa; los fallos se registran y se
    /// continúa con la siguiente ruta.
    pub async fn generate_all_route_schedules(&self) -> AppResult<Vec<PathBuf>> {
        let routes = self.repository.list_routes().await?;
        let mut generated = Vec::new();

        for route in routes.into_iter().filter(|r| r.is_active) {
            match self.generate_route_schedule(route.id).await {
                Ok(path) => generated.push(path),
                Err(e) => error!("❌ Error generando el horario de {}: {}", route.route_name, e),
            }
        }

        info!("📄 {} horarios de ruta generados", generated.len());
        Ok(generated)
    }

    /// Resumen de todas las rutas con sus estudiantes AM/PM y los no asignados
    pub async fn generate_route_summary_report(&self) -> AppResult<PathBuf> {
        let routes = self.repository.list_routes().await?;
        let students = self.repository.list_students().await?;
        let now = Utc::now();

        let mut report = String::new();
        let _ = writeln!(report, "ROUTE SUMMARY REPORT");
        let _ = writeln!(report, "{}", "=".repeat(50));
        let _ = writeln!(report, "Generated: {}", now.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(report);
        let _ = writeln!(report, "SUMMARY");
        let _ = writeln!(report, "{}", "-".repeat(30));
        let _ = writeln!(report, "Total Routes: {}", routes.len());
        let _ = writeln!(report, "Total Students: {}", students.len());
        let _ = writeln!(report, "AM Assigned Students: {}", students.iter().filter(|s| s.am_route.is_some()).count());
        let _ = writeln!(report, "PM Assigned Students: {}", students.iter().filter(|s| s.pm_route.is_some()).count());
        let _ = writeln!(report);
        let _ = writeln!(report, "ROUTE DETAILS");
        let _ = writeln!(report, "{}", "-".repeat(30));

        for route in &routes {
            let _ = writeln!(report, "Route: {}", route.route_name);
            let _ = writeln!(report, "  School: {}", route.school.as_deref().unwrap_or(""));
            let _ = writeln!(report, "  Date: {}", route.route_date.format("%Y-%m-%d"));
            for slot in [RouteTimeSlot::Am, RouteTimeSlot::Pm] {
                let riders: Vec<&Student> = students
                    .iter()
                    .filter(|s| s.rides_route(&route.route_name, slot))
                    .collect();
                let _ = writeln!(report, "  {} Students ({}):", slot, riders.len());
                for student in riders {
                    let _ = writeln!(report, "    - {}", student_line(student));
                }
            }
            let _ = writeln!(report);
        }

        let unassigned: Vec<&Student> = students.iter().filter(|s| !s.has_any_route()).collect();
        if !unassigned.is_empty() {
            let _ = writeln!(report, "UNASSIGNED STUDENTS");
            let _ = writeln!(report, "{}", "-".repeat(30));
            for student in unassigned {
                let _ = writeln!(report, "  - {}", student_line(student));
            }
        }

        let file_name = format!("Route-Summary-{}.txt", now.format("%Y%m%d_%H%M%S"));
        self.write_report(&file_name, &report).await
    }

    async fn write_report(&self, file_name: &str, content: &str) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(&self.reports_dir).await?;
        let path = self.reports_dir.join(file_name);
        tokio::fs::write(&path, content).await?;
        info!("💾 Reporte escrito: {}", path.display());
        Ok(path)
    }
}

/// Solo `[A-Za-z0-9_-]` del nombre, de modo que el archivo queda siempre
/// dentro del directorio de reportes. La fecha distingue rutas homónimas.
pub fn schedule_file_name(route_name: &str, route_date: NaiveDate) -> String {
    let compact: String = route_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let compact = if compact.is_empty() { "Unnamed".to_string() } else { compact };
    format!("Route-{}-{}-Schedule.txt", compact, route_date.format("%Y-%m-%d"))
}

/// Horario legible de la ruta: cabecera, asignaciones, paradas y estudiantes
pub fn route_schedule_text(plan: &RoutePlan) -> String {
    let route = &plan.route;
    let mut text = String::new();

    let _ = writeln!(text, "ROUTE SCHEDULE: {}", route.route_name);
    let _ = writeln!(text, "{}", "=".repeat(50));
    let _ = writeln!(text, "Date: {}", route.route_date.format("%Y-%m-%d"));
    if let Some(school) = &route.school {
        let _ = writeln!(text, "School: {}", school);
    }
    if let Some(description) = &route.description {
        let _ = writeln!(text, "Description: {}", description);
    }
    let _ = writeln!(text, "Status: {}", plan.status_indicator());
    let _ = writeln!(text, "Capacity: {}", plan.display_name());
    let _ = writeln!(text);

    let _ = writeln!(text, "ASSIGNMENTS");
    let _ = writeln!(text, "{}", "-".repeat(30));
    let leg = |bus: Option<&Bus>, driver: Option<&Driver>| {
        format!(
            "Bus {} / Driver {}",
            bus.map(|b| b.bus_number.as_str()).unwrap_or("Unassigned"),
            driver.map(Driver::full_name).unwrap_or_else(|| "Unassigned".to_string())
        )
    };
    let _ = writeln!(text, "AM: {}", leg(plan.am_bus.as_ref(), plan.am_driver.as_ref()));
    let _ = writeln!(text, "PM: {}", leg(plan.pm_bus.as_ref(), plan.pm_driver.as_ref()));
    let _ = writeln!(text);

    let _ = writeln!(text, "STOPS ({})", plan.stops().len());
    let _ = writeln!(text, "{}", "-".repeat(30));
    for stop in plan.stops() {
        let _ = writeln!(
            text,
            "{:>2}. {}  {}{}",
            stop.stop_order,
            stop.scheduled_time.format("%H:%M"),
            stop.stop_name,
            stop.address
                .as_deref()
                .map(|a| format!(" ({})", a))
                .unwrap_or_default()
        );
    }
    let _ = writeln!(text, "Estimated total time: {} min", plan.estimated_total_time().num_minutes());
    let _ = writeln!(text);

    for slot in [RouteTimeSlot::Am, RouteTimeSlot::Pm] {
        let riders: Vec<&Student> = plan
            .assigned_students()
            .iter()
            .filter(|s| s.rides_route(&route.route_name, slot))
            .collect();
        let _ = writeln!(text, "{} STUDENTS ({})", slot, riders.len());
        let _ = writeln!(text, "{}", "-".repeat(30));
        for student in riders {
            let _ = writeln!(
                text,
                "  - {} | Stop: {}",
                student_line(student),
                student.bus_stop.as_deref().unwrap_or("-")
            );
        }
        let _ = writeln!(text);
    }

    text
}

fn student_line(student: &Student) -> String {
    format!(
        "{} (Grade: {})",
        student.student_name,
        student.grade.as_deref().unwrap_or("-")
    )
}

/// Campo de texto entre comillas con las comillas internas duplicadas
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn opt(value: &Option<String>) -> String {
    quote(value.as_deref().unwrap_or(""))
}

pub fn students_to_csv(students: &[Student]) -> String {
    let mut csv = String::from(STUDENT_CSV_HEADER);
    csv.push('\n');
    for s in students {
        let row = [
            opt(&s.student_number),
            quote(&s.student_name),
            opt(&s.grade),
            opt(&s.school),
            opt(&s.home_address),
            opt(&s.city),
            opt(&s.state),
            opt(&s.zip),
            opt(&s.parent_guardian),
            opt(&s.home_phone),
            opt(&s.emergency_phone),
            opt(&s.bus_stop),
            opt(&s.am_route),
            opt(&s.pm_route),
            s.active.to_string(),
        ];
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    csv
}

pub fn drivers_to_csv(drivers: &[Driver]) -> String {
    let mut csv = String::from(DRIVER_CSV_HEADER);
    csv.push('\n');
    for d in drivers {
        let row = [
            quote(&d.first_name),
            quote(&d.last_name),
            quote(&d.license_number),
            d.license_expiration
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            opt(&d.phone),
            d.is_active.to_string(),
        ];
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    csv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Route, RouteStop};
    use crate::repositories::InMemoryTransportRepository;
    use crate::utils::resilience::RetryPolicy;
    use chrono::{NaiveDate, NaiveTime};

    fn service(dir: &Path) -> (ReportService, Arc<InMemoryTransportRepository>) {
        let repo = Arc::new(InMemoryTransportRepository::new());
        let routes = RouteService::new(repo.clone(), RetryPolicy::default());
        (ReportService::new(repo.clone(), routes, dir), repo)
    }

    #[test]
    fn test_schedule_file_name_keeps_safe_characters() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 2).unwrap();
        assert_eq!(schedule_file_name("East Side 2", date), "Route-EastSide2-2025-09-02-Schedule.txt");
        assert_eq!(schedule_file_name("East/West", date), "Route-EastWest-2025-09-02-Schedule.txt");
        assert_eq!(schedule_file_name("../../etc", date), "Route-etc-2025-09-02-Schedule.txt");
        assert_eq!(schedule_file_name("🚌", date), "Route-Unnamed-2025-09-02-Schedule.txt");
    }

    #[test]
    fn test_students_csv_quotes_text_fields() {
        let mut student = Student::new("Ava \"AJ\" Miller");
        student.home_address = Some("12 Main St, Apt 3".to_string());
        let csv = students_to_csv(&[student]);
        let mut lines = csv.lines();

        assert_eq!(lines.next(), Some(STUDENT_CSV_HEADER));
        let row = lines.next().unwrap();
        assert!(row.contains("\"Ava \"\"AJ\"\" Miller\""));
        assert!(row.contains("\"12 Main St, Apt 3\""));
        assert!(row.ends_with(",true"));
    }

    #[test]
    fn test_drivers_csv() {
        let mut driver = Driver::new("Dana", "Lopez", "CO-1");
        driver.license_expiration = NaiveDate::from_ymd_opt(2027, 1, 31);
        let csv = drivers_to_csv(&[driver]);
        assert!(csv.lines().nth(1).unwrap().starts_with("\"Dana\",\"Lopez\",\"CO-1\",2027-01-31,"));
    }

    #[test]
    fn test_schedule_text_lists_stops_and_riders() {
        let route = Route::new("East", NaiveDate::from_ymd_opt(2025, 9, 2).unwrap());
        let route_id = route.id;
        let mut am = Student::new("Ava");
        am.am_route = Some("East".to_string());
        let mut pm = Student::new("Ben");
        pm.pm_route = Some("East".to_string());
        let mut stop = RouteStop::new(route_id, "Main & 3rd", NaiveTime::from_hms_opt(7, 5, 0).unwrap());
        stop.stop_order = 1;

        let plan = RoutePlan::new(route)
            .with_am(Some(Bus::new("Bus #7", 30)), None)
            .with_students(vec![am, pm])
            .with_stops(vec![stop]);
        let text = route_schedule_text(&plan);

        assert!(text.starts_with("ROUTE SCHEDULE: East"));
        assert!(text.contains("AM: Bus Bus #7 / Driver Unassigned"));
        assert!(text.contains(" 1. 07:05  Main & 3rd"));
        assert!(text.contains("AM STUDENTS (1)"));
        assert!(text.contains("PM STUDENTS (1)"));
    }

    #[tokio::test]
    async fn test_generate_schedules_for_active_routes() {
        let dir = tempfile::tempdir().unwrap();
        let (service, repo) = service(dir.path());

        let mut active = Route::new("East Side", NaiveDate::from_ymd_opt(2025, 9, 2).unwrap());
        active.is_active = true;
        repo.insert_route(&active).await.unwrap();
        repo.insert_route(&Route::new("West", NaiveDate::from_ymd_opt(2025, 9, 2).unwrap()))
            .await
            .unwrap();

        let paths = service.generate_all_route_schedules().await.unwrap();
        assert_eq!(paths, vec![dir.path().join("Route-EastSide-2025-09-02-Schedule.txt")]);
        let content = tokio::fs::read_to_string(&paths[0]).await.unwrap();
        assert!(content.contains("ROUTE SCHEDULE: East Side"));
    }

    #[tokio::test]
    async fn test_schedule_with_slash_stays_in_reports_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (service, repo) = service(dir.path());

        let first = Route::new("East/West", NaiveDate::from_ymd_opt(2025, 9, 2).unwrap());
        let second = Route::new("East/West", NaiveDate::from_ymd_opt(2025, 9, 3).unwrap());
        repo.insert_route(&first).await.unwrap();
        repo.insert_route(&second).await.unwrap();

        let path = service.generate_route_schedule(first.id).await.unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path, dir.path().join("Route-EastWest-2025-09-02-Schedule.txt"));
        service.generate_route_schedule(second.id).await.unwrap();

        let mut entries = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        entries.sort();
        assert_eq!(
            entries,
            vec!["Route-EastWest-2025-09-02-Schedule.txt", "Route-EastWest-2025-09-03-Schedule.txt"]
        );
    }

    #[tokio::test]
    async fn test_exports_create_reports_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("exports");
        let (service, repo) = service(&nested);
        repo.insert_student(&Student::new("Ava")).await.unwrap();

        let path = service.export_students_csv().await.unwrap();
        assert_eq!(path, nested.join("students.csv"));
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 2);

        let summary = service.generate_route_summary_report().await.unwrap();
        let content = tokio::fs::read_to_string(&summary).await.unwrap();
        assert!(content.contains("UNASSIGNED STUDENTS"));
        assert!(content.contains("Ava (Grade: -)"));
    }
}
