use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{RouteTimeSlot, Student};
use crate::utils::validation::validate_not_empty;

// Request para crear un estudiante
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    #[validate(length(max = 20))]
    pub student_number: Option<String>,
    #[validate(length(min = 1, max = 100), custom = "validate_not_empty")]
    pub student_name: String,
    pub grade: Option<String>,
    pub school: Option<String>,
    pub home_address: Option<String>,
    pub city: Option<String>,
    #[validate(length(equal = 2))]
    pub state: Option<String>,
    pub zip: Option<String>,
    pub home_phone: Option<String>,
    pub parent_guardian: Option<String>,
    pub emergency_phone: Option<String>,
    pub bus_stop: Option<String>,
    pub am_route: Option<String>,
    pub pm_route: Option<String>,
    pub transportation_notes: Option<String>,
    pub medical_notes: Option<String>,
    pub enrollment_date: Option<NaiveDate>,
}

impl CreateStudentRequest {
    pub fn into_student(self) -> Student {
        let mut student = Student::new(self.student_name);
        student.student_number = self.student_number;
        student.grade = self.grade;
        student.school = self.school;
        student.home_address = self.home_address;
        student.city = self.city;
        student.state = self.state;
        student.zip = self.zip;
        student.home_phone = self.home_phone;
        student.parent_guardian = self.parent_guardian;
        student.emergency_phone = self.emergency_phone;
        student.bus_stop = self.bus_stop;
        student.am_route = self.am_route;
        student.pm_route = self.pm_route;
        student.transportation_notes = self.transportation_notes;
        student.medical_notes = self.medical_notes;
        student.enrollment_date = self.enrollment_date;
        student
    }
}

// Request para actualizar un estudiante (solo los campos presentes)
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateStudentRequest {
    #[validate(length(max = 20))]
    pub student_number: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub student_name: Option<String>,
    pub grade: Option<String>,
    pub school: Option<String>,
    pub home_address: Option<String>,
    pub city: Option<String>,
    #[validate(length(equal = 2))]
    pub state: Option<String>,
    pub zip: Option<String>,
    pub home_phone: Option<String>,
    pub parent_guardian: Option<String>,
    pub emergency_phone: Option<String>,
    pub transportation_notes: Option<String>,
    pub medical_notes: Option<String>,
}

impl UpdateStudentRequest {
    pub fn apply_to(self, student: &mut Student) {
        if let Some(v) = self.student_number {
            student.student_number = Some(v);
        }
        if let Some(v) = self.student_name {
            student.student_name = v;
        }
        if let Some(v) = self.grade {
            student.grade = Some(v);
        }
        if let Some(v) = self.school {
            student.school = Some(v);
        }
        if let Some(v) = self.home_address {
            student.home_address = Some(v);
        }
        if let Some(v) = self.city {
            student.city = Some(v);
        }
        if let Some(v) = self.state {
            student.state = Some(v);
        }
        if let Some(v) = self.zip {
            student.zip = Some(v);
        }
        if let Some(v) = self.home_phone {
            student.home_phone = Some(v);
        }
        if let Some(v) = self.parent_guardian {
            student.parent_guardian = Some(v);
        }
        if let Some(v) = self.emergency_phone {
            student.emergency_phone = Some(v);
        }
        if let Some(v) = self.transportation_notes {
            student.transportation_notes = Some(v);
        }
        if let Some(v) = self.medical_notes {
            student.medical_notes = Some(v);
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StudentSearchQuery {
    pub q: Option<String>,
    pub grade: Option<String>,
    pub route: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateActiveStatusRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignBusStopRequest {
    #[validate(length(min = 1, max = 50))]
    pub bus_stop: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignByAddressRequest {
    /// Sin ids se procesan todos los estudiantes activos
    #[serde(default)]
    pub student_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct StudentValidationResponse {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StudentRouteRequest {
    pub student_id: Uuid,
    #[serde(default)]
    pub slot: RouteTimeSlot,
}
