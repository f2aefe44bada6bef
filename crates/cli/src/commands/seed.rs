//! Reference registry seeding.
//!
//! Creates the three categories with a starting set of items. Items whose
//! key already exists are skipped, so running this twice is harmless.

use mercato_api::db::ReferenceRepository;
use mercato_api::services::ServiceError;
use mercato_api::services::reference::{ReferenceForm, ReferenceItemForm, ReferenceService, Saved};
use mercato_core::ReferenceCategoryKind;

use super::connect;

/// Default items per category as `(name, description)`.
const DEFAULTS: [(ReferenceCategoryKind, &[(&str, &str)]); 3] = [
    (
        ReferenceCategoryKind::Roles,
        &[
            ("Super Admin", "Full access, single seat"),
            ("Admin", "Manages reference data"),
            ("Customer", "Shops and places orders"),
            ("User", "Registered without purchasing rights"),
        ],
    ),
    (
        ReferenceCategoryKind::ProjectTypes,
        &[
            ("Apartment", ""),
            ("Villa", ""),
            ("Plot", ""),
            ("Commercial", ""),
        ],
    ),
    (
        ReferenceCategoryKind::CompanyTypes,
        &[
            ("Private Ltd", ""),
            ("LLP", ""),
            ("Partnership", ""),
            ("Proprietorship", ""),
        ],
    ),
];

fn form(kind: ReferenceCategoryKind, items: &[(&str, &str)]) -> ReferenceForm {
    let items = (0_i32..)
        .zip(items)
        .map(|(order, (name, description))| ReferenceItemForm {
            name: Some((*name).to_owned()),
            description: Some((*description).to_owned()),
            sort_order: Some(order),
            ..ReferenceItemForm::default()
        })
        .collect();
    ReferenceForm {
        category: Some(kind.label().to_owned()),
        items: Some(items),
        ..ReferenceForm::default()
    }
}

/// Create or top up every default category.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect().await?;
    let store = ReferenceRepository::new(pool);
    let service = ReferenceService::new(&store);

    for (kind, items) in DEFAULTS {
        match service.create_or_append(form(kind, items)).await {
            Ok(Saved::Created(category)) => {
                tracing::info!("Created {kind} with {} item(s)", category.item_total());
            }
            Ok(Saved::Appended(category)) => {
                tracing::info!("Topped up {kind}, now {} item(s)", category.item_total());
            }
            Err(ServiceError::Conflict(_)) => tracing::info!("{kind} already seeded"),
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!("Reference seeding complete!");
    Ok(())
}
