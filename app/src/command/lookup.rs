use crate::command::{CommandStrategy, build_engine, build_service, open_store};
use lookup_config::Config;
use lookup_core::{Administration, ExtractedRecord, LookupOutcome, MIN_QUERY_CHARS, Payload, UserId};
use std::sync::Arc;

/// Input for the `lookup` command.
pub struct LookupInput {
    pub user: String,
    pub query: String,
    pub memory: bool,
}

/// Runs one request through the same service the bot uses and prints the
/// result as plain text.
pub struct LookupStrategy;

impl CommandStrategy for LookupStrategy {
    type Input = LookupInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let store = open_store(&config, input.memory).await?;
        let service = build_service(&config, build_engine(&config, store))?;

        let user = UserId::from(input.user.as_str());
        let admin = Administration::new(Arc::clone(service.engine()));
        admin.register_user(&user).await?;
        let maintenance = admin.maintenance().await?;

        match service
            .handle_lookup_request(&user, &input.query, maintenance)
            .await?
        {
            LookupOutcome::Ignored => {
                println!("Query ignored: at least {MIN_QUERY_CHARS} characters are required");
            }
            LookupOutcome::Denied(decision) => {
                println!(
                    "Denied: {:?} (limit {}/day)",
                    decision.reason, decision.ceiling
                );
            }
            LookupOutcome::Completed { query, payload, .. } => {
                println!("Results for {query}:\n");
                match payload {
                    Payload::Records(records) => print!("{}", plain_records(&records)),
                    Payload::RawText(text) => println!("{text}"),
                    Payload::NoData => println!("No data found"),
                }
                let standing = service.engine().standing(&user).await?;
                println!(
                    "\n{} | used {}/{} today",
                    standing.label(),
                    standing.used_today,
                    standing.ceiling
                );
            }
        }

        Ok(())
    }
}

fn plain_records(records: &[ExtractedRecord]) -> String {
    records
        .iter()
        .map(|record| {
            let fields: String = record
                .fields
                .iter()
                .map(|field| format!("  {}: {}\n", field.label, field.value))
                .collect();
            format!("Record {}\n{fields}\n", record.ordinal)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::plain_records;
    use lookup_core::extract;

    #[test]
    fn test_plain_records() {
        let records = extract(r#"[{"name": "Ann", "phone": "555"}, {"name": "Bob"}]"#);
        let text = plain_records(&records);

        assert!(text.starts_with("Record 1\n"));
        assert!(text.contains("Record 2\n"));
        assert!(text.contains(": Ann\n"));
        assert!(text.contains(": 555\n"));
    }

    #[test]
    fn test_plain_records_empty() {
        assert!(plain_records(&[]).is_empty());
    }
}
