//! # Notification Rendering
//!
//! Turns a typed payload into subject and body text for delivery. Email
//! gets the full body; SMS gets the compact single-line form.

use haven_core::{Channel, Money, NotificationPayload};

/// Rendered notification content, ready for a channel sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    pub subject: String,
    pub body: String,
}

/// Renders a payload for a channel.
pub fn render(payload: &NotificationPayload, channel: Channel) -> RenderedNotification {
    match payload {
        NotificationPayload::BillingIssued {
            billing_month,
            total_minor,
            due_date,
            ..
        } => {
            let total = Money::from_minor(*total_minor);
            let subject = format!("Your {billing_month} invoice has been issued");
            let body = match channel {
                Channel::Email => format!(
                    "Your invoice for {billing_month} has been issued.\n\n\
                     Amount due: {total}\n\
                     Due date:   {due_date}\n\n\
                     Please arrange payment by the due date."
                ),
                Channel::Sms => {
                    format!("Invoice {billing_month}: {total} due {due_date}.")
                }
            };
            RenderedNotification { subject, body }
        }

        NotificationPayload::PaymentReminder {
            billing_month,
            remaining_minor,
            due_date,
            days_until_due,
            ..
        } => {
            let remaining = Money::from_minor(*remaining_minor);
            let subject = format!("Payment reminder: {billing_month} invoice due in {days_until_due} days");
            let body = match channel {
                Channel::Email => format!(
                    "This is a reminder that your {billing_month} invoice is due on {due_date}.\n\n\
                     Outstanding balance: {remaining}\n\n\
                     If you have already paid, please disregard this notice."
                ),
                Channel::Sms => format!(
                    "Reminder: {remaining} due {due_date} for {billing_month}."
                ),
            };
            RenderedNotification { subject, body }
        }

        NotificationPayload::OverdueNotice {
            billing_month,
            remaining_minor,
            due_date,
            ..
        } => {
            let remaining = Money::from_minor(*remaining_minor);
            let subject = format!("Overdue notice: {billing_month} invoice");
            let body = match channel {
                Channel::Email => format!(
                    "Your {billing_month} invoice was due on {due_date} and remains unpaid.\n\n\
                     Outstanding balance: {remaining}\n\n\
                     Please arrange payment as soon as possible, or contact the \
                     management office if you have any questions."
                ),
                Channel::Sms => format!(
                    "Overdue: {remaining} for {billing_month} (was due {due_date})."
                ),
            };
            RenderedNotification { subject, body }
        }

        NotificationPayload::PaymentConfirmed {
            billing_month,
            amount_minor,
            remaining_minor,
            paid_on,
            ..
        } => {
            let amount = Money::from_minor(*amount_minor);
            let subject = format!("Payment received for {billing_month}");
            let body = if *remaining_minor > 0 {
                let remaining = Money::from_minor(*remaining_minor);
                format!(
                    "We received your payment of {amount} on {paid_on}.\n\n\
                     Remaining balance: {remaining}"
                )
            } else {
                format!(
                    "We received your payment of {amount} on {paid_on}.\n\n\
                     Your {billing_month} invoice is now fully paid. Thank you."
                )
            };
            match channel {
                Channel::Email => RenderedNotification { subject, body },
                Channel::Sms => RenderedNotification {
                    subject,
                    body: format!("Payment of {amount} received on {paid_on}. Thank you."),
                },
            }
        }

        NotificationPayload::LeaseExpiring {
            unit_name,
            end_date,
            days_remaining,
            ..
        } => {
            let subject = format!("Lease for unit {unit_name} expires in {days_remaining} days");
            let body = match channel {
                Channel::Email => format!(
                    "The lease for unit {unit_name} ends on {end_date} \
                     ({days_remaining} days from now).\n\n\
                     Please contact the management office to discuss renewal."
                ),
                Channel::Sms => {
                    format!("Lease for unit {unit_name} ends {end_date}. Contact us to renew.")
                }
            };
            RenderedNotification { subject, body }
        }

        NotificationPayload::SubmissionReviewed {
            fee_name,
            approved,
            reason,
            ..
        } => {
            if *approved {
                RenderedNotification {
                    subject: format!("Your {fee_name} meter reading was accepted"),
                    body: format!(
                        "Your submitted {fee_name} meter reading has been accepted \
                         and will appear on your next invoice."
                    ),
                }
            } else {
                let reason = reason.as_deref().unwrap_or("no reason given");
                RenderedNotification {
                    subject: format!("Your {fee_name} meter reading was declined"),
                    body: format!(
                        "Your submitted {fee_name} meter reading was declined: {reason}.\n\n\
                         Please submit a corrected reading."
                    ),
                }
            }
        }

        NotificationPayload::Announcement { title, body } => RenderedNotification {
            subject: title.clone(),
            body: body.clone(),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
