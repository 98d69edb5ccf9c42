//! School directory entities served by the generic resource endpoints

use super::{Reference, Resource};
use crate::core::error::ValidationError;
use crate::core::field::validate_phone;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

crate::impl_data_entity!(
    AcademicYear,
    "academic_year",
    ["name", "is_current"],
    {
        name: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
        #[serde(default)]
        is_current: bool,
    }
);

crate::impl_data_entity!(
    SchoolClass,
    "class",
    ["academic_year_id"],
    {
        name: String,
        #[serde(default)]
        grade: Option<i32>,
        #[serde(default)]
        academic_year_id: Option<Uuid>,
    }
);

crate::impl_data_entity!(
    Section,
    "section",
    ["class_id"],
    {
        name: String,
        class_id: Uuid,
        #[serde(default)]
        capacity: Option<i32>,
    }
);

crate::impl_data_entity!(
    Subject,
    "subject",
    ["code", "class_id"],
    {
        name: String,
        code: String,
        #[serde(default)]
        class_id: Option<Uuid>,
    }
);

crate::impl_data_entity!(
    Parent,
    "parent",
    ["phone"],
    {
        name: String,
        #[serde(default)]
        email: Option<String>,
        phone: String,
        #[serde(default)]
        relation: Option<String>,
    }
);

crate::impl_data_entity!(
    Student,
    "student",
    ["admission_number", "class_id", "parent_id", "biometric_id"],
    {
        name: String,
        admission_number: String,
        class_id: Uuid,
        #[serde(default)]
        section_id: Option<Uuid>,
        #[serde(default)]
        parent_id: Option<Uuid>,
        #[serde(default)]
        biometric_id: Option<String>,
        #[serde(default)]
        date_of_birth: Option<NaiveDate>,
        #[serde(default)]
        roll_number: Option<i32>,
    }
);

crate::impl_data_entity!(
    Staff,
    "staff",
    ["role", "biometric_id"],
    {
        name: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        phone: Option<String>,
        role: String,
        #[serde(default)]
        biometric_id: Option<String>,
    }
);

crate::impl_data_entity!(
    MessageTemplate,
    "message_template",
    ["name"],
    {
        name: String,
        body: String,
        language: String,
    }
);

fn default_language() -> String {
    "en".to_string()
}

// ---------------------------------------------------------------------------
// Academic years
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAcademicYear {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAcademicYear {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: Option<bool>,
}

impl Resource for AcademicYear {
    type Create = CreateAcademicYear;
    type Update = UpdateAcademicYear;

    fn from_create(input: CreateAcademicYear) -> Self {
        Self::new(input.name, input.start_date, input.end_date, input.is_current)
    }

    fn apply_update(&mut self, input: UpdateAcademicYear) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(start) = input.start_date {
            self.start_date = start;
        }
        if let Some(end) = input.end_date {
            self.end_date = end;
        }
        if let Some(current) = input.is_current {
            self.is_current = current;
        }
    }

    fn unique_fields() -> &'static [&'static str] {
        &["name"]
    }

    fn check(&self) -> Result<(), ValidationError> {
        if self.end_date <= self.start_date {
            return Err(ValidationError::field(
                "endDate",
                "must be after startDate",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClass {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(range(min = 0, max = 12))]
    pub grade: Option<i32>,
    pub academic_year_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClass {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 12))]
    pub grade: Option<i32>,
    pub academic_year_id: Option<Uuid>,
}

impl Resource for SchoolClass {
    type Create = CreateClass;
    type Update = UpdateClass;

    fn from_create(input: CreateClass) -> Self {
        Self::new(input.name, input.grade, input.academic_year_id)
    }

    fn apply_update(&mut self, input: UpdateClass) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if input.grade.is_some() {
            self.grade = input.grade;
        }
        if input.academic_year_id.is_some() {
            self.academic_year_id = input.academic_year_id;
        }
    }

    fn references(&self) -> Vec<Reference> {
        Reference::optional("academic_year", self.academic_year_id)
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSection {
    #[validate(length(min = 1, max = 20))]
    pub name: String,
    pub class_id: Uuid,
    #[validate(range(min = 1, max = 500))]
    pub capacity: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSection {
    #[validate(length(min = 1, max = 20))]
    pub name: Option<String>,
    pub class_id: Option<Uuid>,
    #[validate(range(min = 1, max = 500))]
    pub capacity: Option<i32>,
}

impl Resource for Section {
    type Create = CreateSection;
    type Update = UpdateSection;

    fn from_create(input: CreateSection) -> Self {
        Self::new(input.name, input.class_id, input.capacity)
    }

    fn apply_update(&mut self, input: UpdateSection) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(class_id) = input.class_id {
            self.class_id = class_id;
        }
        if input.capacity.is_some() {
            self.capacity = input.capacity;
        }
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new("class", self.class_id)]
    }
}

// ---------------------------------------------------------------------------
// Subjects
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubject {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    pub class_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubject {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    pub class_id: Option<Uuid>,
}

impl Resource for Subject {
    type Create = CreateSubject;
    type Update = UpdateSubject;

    fn from_create(input: CreateSubject) -> Self {
        Self::new(input.name, input.code, input.class_id)
    }

    fn apply_update(&mut self, input: UpdateSubject) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(code) = input.code {
            self.code = code;
        }
        if input.class_id.is_some() {
            self.class_id = input.class_id;
        }
    }

    fn references(&self) -> Vec<Reference> {
        Reference::optional("class", self.class_id)
    }

    fn unique_fields() -> &'static [&'static str] {
        &["code"]
    }
}

// ---------------------------------------------------------------------------
// Parents
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateParent {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    pub relation: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParent {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    pub relation: Option<String>,
}

impl Resource for Parent {
    type Create = CreateParent;
    type Update = UpdateParent;

    fn from_create(input: CreateParent) -> Self {
        Self::new(input.name, input.email, input.phone, input.relation)
    }

    fn apply_update(&mut self, input: UpdateParent) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if input.email.is_some() {
            self.email = input.email;
        }
        if let Some(phone) = input.phone {
            self.phone = phone;
        }
        if input.relation.is_some() {
            self.relation = input.relation;
        }
    }
}

// ---------------------------------------------------------------------------
// Students
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudent {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 40))]
    pub admission_number: String,
    pub class_id: Uuid,
    pub section_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub biometric_id: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(range(min = 1))]
    pub roll_number: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudent {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 40))]
    pub admission_number: Option<String>,
    pub class_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub biometric_id: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(range(min = 1))]
    pub roll_number: Option<i32>,
}

impl Resource for Student {
    type Create = CreateStudent;
    type Update = UpdateStudent;

    fn from_create(input: CreateStudent) -> Self {
        Self::new(
            input.name,
            input.admission_number,
            input.class_id,
            input.section_id,
            input.parent_id,
            input.biometric_id,
            input.date_of_birth,
            input.roll_number,
        )
    }

    fn apply_update(&mut self, input: UpdateStudent) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(number) = input.admission_number {
            self.admission_number = number;
        }
        if let Some(class_id) = input.class_id {
            self.class_id = class_id;
        }
        if input.section_id.is_some() {
            self.section_id = input.section_id;
        }
        if input.parent_id.is_some() {
            self.parent_id = input.parent_id;
        }
        if input.biometric_id.is_some() {
            self.biometric_id = input.biometric_id;
        }
        if input.date_of_birth.is_some() {
            self.date_of_birth = input.date_of_birth;
        }
        if input.roll_number.is_some() {
            self.roll_number = input.roll_number;
        }
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::new("class", self.class_id)];
        refs.extend(Reference::optional("section", self.section_id));
        refs.extend(Reference::optional("parent", self.parent_id));
        refs
    }

    fn unique_fields() -> &'static [&'static str] {
        &["admission_number", "biometric_id"]
    }
}

// ---------------------------------------------------------------------------
// Staff
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaff {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub role: String,
    #[validate(length(min = 1, max = 64))]
    pub biometric_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStaff {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub role: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub biometric_id: Option<String>,
}

impl Resource for Staff {
    type Create = CreateStaff;
    type Update = UpdateStaff;

    fn from_create(input: CreateStaff) -> Self {
        Self::new(
            input.name,
            input.email,
            input.phone,
            input.role,
            input.biometric_id,
        )
    }

    fn apply_update(&mut self, input: UpdateStaff) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if input.email.is_some() {
            self.email = input.email;
        }
        if input.phone.is_some() {
            self.phone = input.phone;
        }
        if let Some(role) = input.role {
            self.role = role;
        }
        if input.biometric_id.is_some() {
            self.biometric_id = input.biometric_id;
        }
    }

    fn unique_fields() -> &'static [&'static str] {
        &["biometric_id"]
    }
}

// ---------------------------------------------------------------------------
// Message templates
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageTemplate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 4096))]
    pub body: String,
    #[serde(default = "default_language")]
    #[validate(length(min = 2, max = 10))]
    pub language: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessageTemplate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 4096))]
    pub body: Option<String>,
    #[validate(length(min = 2, max = 10))]
    pub language: Option<String>,
}

impl Resource for MessageTemplate {
    type Create = CreateMessageTemplate;
    type Update = UpdateMessageTemplate;

    fn from_create(input: CreateMessageTemplate) -> Self {
        Self::new(input.name, input.body, input.language)
    }

    fn apply_update(&mut self, input: UpdateMessageTemplate) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(body) = input.body {
            self.body = body;
        }
        if let Some(language) = input.language {
            self.language = language;
        }
    }

    fn unique_fields() -> &'static [&'static str] {
        &["name"]
    }

    fn check(&self) -> Result<(), ValidationError> {
        crate::attendance::template::check_syntax(&self.name, &self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Entity;

    #[test]
    fn test_resource_names() {
        assert_eq!(AcademicYear::resource_name(), "academic_years");
        assert_eq!(SchoolClass::resource_name(), "classes");
        assert_eq!(Staff::resource_name(), "staff");
        assert_eq!(MessageTemplate::resource_name(), "message_templates");
    }

    #[test]
    fn test_student_references() {
        let class_id = Uuid::new_v4();
        let parent_id = Uuid::new_v4();
        let student = Student::new(
            "Asha".to_string(),
            "ADM-1".to_string(),
            class_id,
            None,
            Some(parent_id),
            None,
            None,
            None,
        );
        let refs = student.references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], Reference::new("class", class_id));
        assert_eq!(refs[1], Reference::new("parent", parent_id));
    }

    #[test]
    fn test_academic_year_date_order() {
        let d = |m| NaiveDate::from_ymd_opt(2024, m, 1).unwrap();
        assert!(AcademicYear::new("2024-25".into(), d(4), d(3), false).check().is_err());
        assert!(AcademicYear::new("2024-25".into(), d(4), d(12), true).check().is_ok());
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut section = Section::new("A".to_string(), Uuid::new_v4(), Some(40));
        let class_id = section.class_id;
        section.apply_update(UpdateSection {
            name: Some("B".to_string()),
            class_id: None,
            capacity: None,
        });
        assert_eq!(section.name, "B");
        assert_eq!(section.class_id, class_id);
        assert_eq!(section.capacity, Some(40));
    }

    #[test]
    fn test_parent_phone_validation() {
        let bad = CreateParent {
            name: "R. Kumar".to_string(),
            email: None,
            phone: "12".to_string(),
            relation: None,
        };
        assert!(bad.validate().is_err());

        let good = CreateParent {
            phone: "+919876543210".to_string(),
            ..bad
        };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn test_template_syntax_checked() {
        let broken = MessageTemplate::new(
            "attendance_absent".to_string(),
            "Dear {{ parentName".to_string(),
            "en".to_string(),
        );
        assert!(broken.check().is_err());
    }
}
