use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::models::DogListing;
use crate::utils::error::Result;

pub mod telegram;

pub use telegram::TelegramTransport;

const MAX_DESCRIPTION_LENGTH: usize = 200;

/// One-shot delivery calls against the external chat transport. No retry
/// contract is imposed on implementations.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send_text(&self, message: &str) -> Result<()>;
    async fn send_photo(&self, photo_url: &str, caption: &str) -> Result<()>;
}

pub fn format_listing_message(listing: &DogListing) -> String {
    let name = if listing.name.is_empty() {
        "Unknown"
    } else {
        &listing.name
    };
    let breed = if listing.breed.is_empty() {
        "Unknown breed"
    } else {
        &listing.breed
    };
    let description = if listing.description.is_empty() {
        "No description available".to_string()
    } else {
        truncate(&listing.description, MAX_DESCRIPTION_LENGTH)
    };

    format!(
        "🐕 *New Dog Available!*\n\n*Name:* {name}\n*Breed:* {breed}\n*Description:* {description}\n\n[View Listing]({url})",
        url = listing.post_url
    )
}

pub fn format_batch_message(count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("🐕 *Watchdog Update*\n\nFound *{count}* new dog{plural}.\n\nCheck the app for more details!")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

/// FIFO of newly inserted listings awaiting delivery. Owned by the pipeline
/// and flushed once per run; delivery is best-effort, at-most-once per
/// listing per flush.
pub struct NotificationQueue {
    entries: VecDeque<DogListing>,
    message_delay: Duration,
}

impl NotificationQueue {
    pub fn new(message_delay: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            message_delay,
        }
    }

    pub fn enqueue(&mut self, listings: impl IntoIterator<Item = DogListing>) {
        self.entries.extend(listings);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deliver everything queued, in FIFO order, then clear the queue
    /// whether or not every delivery succeeded. With no usable transport the
    /// queue is logged and dropped. Returns the number delivered.
    pub async fn flush(&mut self, transport: Option<&dyn NotificationTransport>) -> usize {
        if self.entries.is_empty() {
            return 0;
        }

        let Some(transport) = transport else {
            info!(
                "Notifications not configured, dropping {} queued entries",
                self.entries.len()
            );
            self.entries.clear();
            return 0;
        };

        let total = self.entries.len();
        info!("Sending {} queued notifications", total);

        let mut delivered = 0;
        let mut index = 0;
        while let Some(listing) = self.entries.pop_front() {
            index += 1;
            let message = format_listing_message(&listing);
            let result = if listing.image_url.is_empty() {
                transport.send_text(&message).await
            } else {
                transport.send_photo(&listing.image_url, &message).await
            };

            match result {
                Ok(()) => {
                    delivered += 1;
                    info!("Sent notification {}/{} for {}", index, total, listing.name);
                }
                Err(e) => warn!("Notification for {} failed: {}", listing.post_url, e),
            }

            if index < total {
                tokio::time::sleep(self.message_delay).await;
            }
        }

        if delivered > 1 {
            if let Err(e) = transport.send_text(&format_batch_message(delivered)).await {
                warn!("Batch summary notification failed: {}", e);
            }
        }

        self.entries.clear();
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        texts: Mutex<Vec<String>>,
        photos: Mutex<Vec<(String, String)>>,
        fail_photos: bool,
    }

    #[async_trait]
    impl NotificationTransport for RecordingTransport {
        async fn send_text(&self, message: &str) -> Result<()> {
            self.texts.lock().unwrap().push(message.to_string());
            Ok(())
        }

        async fn send_photo(&self, photo_url: &str, caption: &str) -> Result<()> {
            if self.fail_photos {
                return Err(crate::utils::error::AppError::Delivery(
                    "photo rejected".to_string(),
                ));
            }
            self.photos
                .lock()
                .unwrap()
                .push((photo_url.to_string(), caption.to_string()));
            Ok(())
        }
    }

    fn listing(n: u32) -> DogListing {
        let now = Utc::now();
        DogListing {
            id: n as i64,
            name: format!("Dog {n}"),
            breed: "Kelpie".to_string(),
            post_url: format!("https://rescue.example.com/dog/{n}"),
            image_url: format!("https://rescue.example.com/photos/{n}.jpg"),
            description: "Friendly".to_string(),
            scraped_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    fn text_only_listing(n: u32) -> DogListing {
        DogListing {
            image_url: String::new(),
            ..listing(n)
        }
    }

    fn queue() -> NotificationQueue {
        NotificationQueue::new(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_flush_batches_with_summary() {
        let transport = RecordingTransport::default();
        let mut queue = queue();
        queue.enqueue((1..=5).map(listing));

        let delivered = queue.flush(Some(&transport)).await;

        assert_eq!(delivered, 5);
        assert_eq!(transport.photos.lock().unwrap().len(), 5);
        // Exactly one summary message since more than one was delivered.
        let texts = transport.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("*5* new dogs"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_flush_single_listing_has_no_summary() {
        let transport = RecordingTransport::default();
        let mut queue = queue();
        queue.enqueue([listing(1)]);

        let delivered = queue.flush(Some(&transport)).await;

        assert_eq!(delivered, 1);
        assert_eq!(transport.photos.lock().unwrap().len(), 1);
        assert!(transport.texts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_without_transport_drops_queue() {
        let mut queue = queue();
        queue.enqueue([listing(1), listing(2)]);

        assert_eq!(queue.flush(None).await, 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_flush_empty_queue_is_noop() {
        let transport = RecordingTransport::default();
        let mut queue = queue();

        assert_eq!(queue.flush(Some(&transport)).await, 0);
        assert!(transport.texts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failures_do_not_stop_flush() {
        let transport = RecordingTransport {
            fail_photos: true,
            ..RecordingTransport::default()
        };
        let mut queue = queue();
        queue.enqueue([listing(1), text_only_listing(2), listing(3)]);

        let delivered = queue.flush(Some(&transport)).await;

        // Only the text-only listing got through; the queue still drains.
        assert_eq!(delivered, 1);
        assert!(queue.is_empty());
        let texts = transport.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Dog 2"));
    }

    #[tokio::test]
    async fn test_text_fallback_without_image() {
        let transport = RecordingTransport::default();
        let mut queue = queue();
        queue.enqueue([text_only_listing(7)]);

        queue.flush(Some(&transport)).await;

        assert!(transport.photos.lock().unwrap().is_empty());
        assert_eq!(transport.texts.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_message_format() {
        let message = format_listing_message(&listing(1));
        assert!(message.contains("*Name:* Dog 1"));
        assert!(message.contains("*Breed:* Kelpie"));
        assert!(message.contains("[View Listing](https://rescue.example.com/dog/1)"));
    }

    #[test]
    fn test_message_defaults_for_empty_fields() {
        let mut bare = listing(1);
        bare.name = String::new();
        bare.breed = String::new();
        bare.description = String::new();

        let message = format_listing_message(&bare);
        assert!(message.contains("*Name:* Unknown"));
        assert!(message.contains("*Breed:* Unknown breed"));
        assert!(message.contains("No description available"));
    }

    #[test]
    fn test_long_descriptions_are_truncated() {
        let mut verbose = listing(1);
        verbose.description = "x".repeat(300);

        let message = format_listing_message(&verbose);
        assert!(message.contains(&format!("{}...", "x".repeat(200))));
        assert!(!message.contains(&"x".repeat(201)));
    }

    #[test]
    fn test_batch_message_pluralization() {
        assert!(format_batch_message(1).contains("*1* new dog."));
        assert!(format_batch_message(4).contains("*4* new dogs."));
    }
}
