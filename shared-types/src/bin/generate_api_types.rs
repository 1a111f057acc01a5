use shared_types::*;
use std::fs;
use std::path::Path;
use ts_rs::TS;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generate TypeScript definitions for the taskpane
    let mut types = Vec::new();

    // Change feed types
    types.push(clean_type(EmailMoved::export_to_string()?));
    types.push(clean_type(EmailBulkMoved::export_to_string()?));

    // Email types
    types.push(clean_type(EmailAddress::export_to_string()?));
    types.push(clean_type(BackendRecipient::export_to_string()?));
    types.push(clean_type(BodyContentType::export_to_string()?));
    types.push(clean_type(BackendEmailBody::export_to_string()?));
    types.push(clean_type(BackendEmailMessage::export_to_string()?));
    types.push(clean_type(CategoryPrediction::export_to_string()?));
    types.push(clean_type(CategorizeRequest::export_to_string()?));
    types.push(clean_type(MoveRequest::export_to_string()?));
    types.push(clean_type(FeedbackRequest::export_to_string()?));

    // Category types
    types.push(clean_type(Keywords::export_to_string()?));
    types.push(clean_type(BackendCategory::export_to_string()?));
    types.push(clean_type(Category::export_to_string()?));
    types.push(clean_type(CreateCategoryRequest::export_to_string()?));
    types.push(clean_type(UpdateCategoryRequest::export_to_string()?));
    types.push(clean_type(PredictCategoryRequest::export_to_string()?));
    types.push(clean_type(OutlookSyncItem::export_to_string()?));
    types.push(clean_type(OutlookSyncResult::export_to_string()?));

    // Bulk move types
    types.push(clean_type(CategoryTarget::export_to_string()?));
    types.push(clean_type(BulkMoveRequest::export_to_string()?));
    types.push(clean_type(BulkMoveMode::export_to_string()?));
    types.push(clean_type(BulkMoveResult::export_to_string()?));
    types.push(clean_type(PlannedMove::export_to_string()?));
    types.push(clean_type(BulkMoveResponse::export_to_string()?));

    // Reports, admin and subscriptions
    types.push(clean_type(CategoryUsageRow::export_to_string()?));
    types.push(clean_type(ServerCategoryUsage::export_to_string()?));
    types.push(clean_type(CreatePresetRequest::export_to_string()?));
    types.push(clean_type(MailSubscription::export_to_string()?));
    types.push(clean_type(CreateSubscriptionRequest::export_to_string()?));
    types.push(clean_type(SubscriptionSchedulerStatus::export_to_string()?));

    // ChangeItem is open-ended, so it is written by hand
    types.push(
        "export type ChangeItem =\n  | ({ type: \"email:moved\" } & EmailMoved)\n  | ({ type: \"email:bulk-moved\" } & EmailBulkMoved)\n  | { type: string; [key: string]: unknown };\n"
            .to_string(),
    );

    let output_dir = Path::new("../taskpane/src/api-types");
    fs::create_dir_all(output_dir)?;

    let output_path = output_dir.join("types.ts");
    let output = types.join("\n\n");

    fs::write(&output_path, output)?;
    println!("Generated TypeScript types in {}", output_path.display());

    Ok(())
}

fn clean_type(mut type_def: String) -> String {
    type_def.retain(|c| c != '\r');

    // Everything lands in one file, so cross-type imports are dropped
    let filtered: Vec<&str> = type_def
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("import type")
                && !trimmed.starts_with("// This file was generated")
                && !trimmed.starts_with("/* This file was generated")
        })
        .collect();

    let result = filtered.join("\n").trim().to_string();
    if result.is_empty() {
        result
    } else {
        format!("{}\n", result)
    }
}
