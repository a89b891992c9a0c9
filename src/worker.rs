use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::mailer::Mailer;
use crate::metrics::{EMAILS_FAILED, EMAILS_SENT};
use crate::models::DispatchJob;

// Background worker -> sends queued notification emails one by one
pub async fn dispatch_worker<M: Mailer>(mut rx: mpsc::Receiver<DispatchJob>, mailer: M) {
    info!("dispatch worker started");

    while let Some(job) = rx.recv().await {
        let result = mailer.send(&job.email).await;

        match &result {
            Ok(()) => {
                EMAILS_SENT.inc();
                info!(subject = %job.email.subject, "notification email sent");
            }
            Err(e) => {
                EMAILS_FAILED.inc();
                warn!(error = %e, "notification email failed");
            }
        }

        // handler may have gone away (client disconnected), nothing to do then
        let _ = job.reply_tx.send(result);
    }

    info!("dispatch queue closed, worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::MailError;
    use crate::models::ContactEmail;
    use crate::tests::RecordingMailer;
    use tokio::sync::oneshot;

    fn email(subject: &str) -> ContactEmail {
        ContactEmail {
            reply_to: "ada@example.com".into(),
            subject: subject.into(),
            text: "body".into(),
        }
    }

    #[tokio::test]
    async fn replies_with_each_send_outcome_in_order() {
        let mailer = RecordingMailer::default();
        let sent = mailer.sent.clone();
        let (tx, rx) = mpsc::channel(4);
        let worker = tokio::spawn(dispatch_worker(rx, mailer));

        for subject in ["one", "two"] {
            let (reply_tx, reply_rx) = oneshot::channel();
            tx.send(DispatchJob {
                email: email(subject),
                reply_tx,
            })
            .await
            .unwrap();
            assert!(reply_rx.await.unwrap().is_ok());
        }

        drop(tx);
        worker.await.unwrap();

        let subjects: Vec<_> = sent.lock().unwrap().iter().map(|e| e.subject.clone()).collect();
        assert_eq!(subjects, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn mail_failures_are_passed_back() {
        let mailer = RecordingMailer::failing();
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(dispatch_worker(rx, mailer));

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(DispatchJob {
            email: email("x"),
            reply_tx,
        })
        .await
        .unwrap();

        assert!(matches!(
            reply_rx.await.unwrap(),
            Err(MailError::Rejected { status: 422, .. })
        ));
    }
}
