//! Per-user change notifications.
//!
//! Every mutating handler publishes a [`ChangeEvent`]. Clients subscribe over
//! Server-Sent Events and treat each event as a hint to re-fetch the affected
//! aggregates; events carry no row data.

use actix_web::web::Bytes;
use futures_util::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use uuid::Uuid;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Goals,
    DailyEntries,
    Months,
    Savings,
    HealthMetrics,
    HtmlCurriculum,
    DesignPortfolio,
    Reflections,
    Profiles,
}

impl Table {
    const ALL: [Table; 9] = [
        Table::Goals,
        Table::DailyEntries,
        Table::Months,
        Table::Savings,
        Table::HealthMetrics,
        Table::HtmlCurriculum,
        Table::DesignPortfolio,
        Table::Reflections,
        Table::Profiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Goals => "goals",
            Table::DailyEntries => "daily_entries",
            Table::Months => "months",
            Table::Savings => "savings",
            Table::HealthMetrics => "health_metrics",
            Table::HtmlCurriculum => "html_curriculum",
            Table::DesignPortfolio => "design_portfolio",
            Table::Reflections => "reflections",
            Table::Profiles => "profiles",
        }
    }

    pub fn from_name(name: &str) -> Option<Table> {
        Table::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// `Insert` when an upsert created the row, `Update` when it hit the conflict branch.
    pub fn for_upsert(inserted: bool) -> ChangeKind {
        if inserted {
            ChangeKind::Insert
        } else {
            ChangeKind::Update
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub user_id: Uuid,
}

/// Broadcast hub shared by all workers. Publishing never blocks; a
/// subscriber that falls behind by more than the capacity is told to resync.
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, user_id: Uuid, table: Table, kind: ChangeKind) {
        log::debug!("Change on {} ({:?}) for user {}", table.as_str(), kind, user_id);
        // No receivers is not an error
        let _ = self.sender.send(ChangeEvent {
            table,
            kind,
            user_id,
        });
    }

    pub fn publish_all(&self, user_id: Uuid, changes: &[(Table, ChangeKind)]) {
        for (table, kind) in changes {
            self.publish(user_id, *table, *kind);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Which events a subscriber wants: always its own user, optionally a
/// subset of tables.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFilter {
    pub user_id: Uuid,
    pub tables: Option<Vec<Table>>,
}

impl ChangeFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.user_id == self.user_id
            && self
                .tables
                .as_ref()
                .map_or(true, |tables| tables.contains(&event.table))
    }
}

/// Parses `goals,savings`. Empty or absent means every table.
pub fn parse_tables(raw: Option<&str>) -> Result<Option<Vec<Table>>, String> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| Table::from_name(name).ok_or_else(|| format!("Unknown table: {}", name)))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn sse_frame(event: &str, data: &str) -> Bytes {
    Bytes::from(format!("event: {}\ndata: {}\n\n", event, data))
}

/// Turns a broadcast receiver into an SSE byte stream for one subscriber.
pub fn event_stream(
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    BroadcastStream::new(receiver).filter_map(move |message| match message {
        Ok(event) if filter.matches(&event) => match serde_json::to_string(&event) {
            Ok(payload) => Some(Ok(sse_frame("change", &payload))),
            Err(e) => {
                log::error!("Failed to serialize change event {:?}: {}", event, e);
                None
            }
        },
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            log::warn!(
                "Change subscriber for user {} lagged by {} events, asking for resync",
                filter.user_id,
                skipped
            );
            Some(Ok(sse_frame(
                "resync",
                &serde_json::json!({ "skipped": skipped }).to_string(),
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_for(user_id: Uuid, tables: Option<Vec<Table>>) -> ChangeFilter {
        ChangeFilter { user_id, tables }
    }

    #[test]
    fn upsert_kind_follows_the_inserted_flag() {
        assert_eq!(ChangeKind::for_upsert(true), ChangeKind::Insert);
        assert_eq!(ChangeKind::for_upsert(false), ChangeKind::Update);
    }

    #[tokio::test]
    async fn month_subscriber_sees_lazily_created_month() {
        let feed = ChangeFeed::new(8);
        let alice = Uuid::new_v4();
        let filter = filter_for(alice, Some(vec![Table::Months]));
        let mut receiver = feed.subscribe();

        feed.publish_all(
            alice,
            &[
                (Table::Months, ChangeKind::Insert),
                (Table::DailyEntries, ChangeKind::Insert),
            ],
        );

        let first = receiver.recv().await.unwrap();
        assert!(filter.matches(&first));
        assert_eq!(first.kind, ChangeKind::Insert);
        let second = receiver.recv().await.unwrap();
        assert!(!filter.matches(&second));
    }

    #[test]
    fn parses_table_lists() {
        assert_eq!(parse_tables(None), Ok(None));
        assert_eq!(parse_tables(Some("  ")), Ok(None));
        assert_eq!(
            parse_tables(Some("goals, daily_entries")),
            Ok(Some(vec![Table::Goals, Table::DailyEntries]))
        );
        assert!(parse_tables(Some("goals,users")).is_err());
    }

    #[test]
    fn filter_is_scoped_to_user_and_tables() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let event = ChangeEvent {
            table: Table::Savings,
            kind: ChangeKind::Insert,
            user_id: alice,
        };

        assert!(filter_for(alice, None).matches(&event));
        assert!(!filter_for(bob, None).matches(&event));
        assert!(filter_for(alice, Some(vec![Table::Savings])).matches(&event));
        assert!(!filter_for(alice, Some(vec![Table::Goals])).matches(&event));
    }

    #[tokio::test]
    async fn stream_delivers_only_matching_events() {
        let feed = ChangeFeed::new(16);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let stream = event_stream(feed.subscribe(), filter_for(alice, Some(vec![Table::Goals])));
        tokio::pin!(stream);

        feed.publish(bob, Table::Goals, ChangeKind::Insert);
        feed.publish(alice, Table::Savings, ChangeKind::Insert);
        feed.publish(alice, Table::Goals, ChangeKind::Update);

        let frame = stream.next().await.unwrap().unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.starts_with("event: change\n"));
        assert!(text.contains(r#""table":"goals""#));
        assert!(text.contains(r#""kind":"update""#));
        assert!(text.contains(&alice.to_string()));
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_resync() {
        let feed = ChangeFeed::new(2);
        let alice = Uuid::new_v4();
        let stream = event_stream(feed.subscribe(), filter_for(alice, None));
        tokio::pin!(stream);

        for _ in 0..5 {
            feed.publish(alice, Table::DailyEntries, ChangeKind::Update);
        }

        let frame = stream.next().await.unwrap().unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.starts_with("event: resync\n"));
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let feed = ChangeFeed::new(4);
        assert_eq!(feed.subscriber_count(), 0);
        feed.publish(Uuid::new_v4(), Table::Profiles, ChangeKind::Update);
    }
}
