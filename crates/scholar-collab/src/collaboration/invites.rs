use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{info, warn};

use super::domain::{
    awaiting, status, BaseChanges, CollaborationId, CollaborationInvite, DeliveryStatus,
    NewInvite, StudentContact, UserId,
};
use super::notify::{send_with_timeout, NotificationGateway};
use super::repository::CollaborationStore;
use super::service::{CollaborationError, CollaborationService, ValidationError};
use super::templates;

/// Invites stay valid for a week after they are issued.
pub const INVITE_TTL_DAYS: i64 = 7;

/// 256 bits from the OS RNG, hex encoded (64 characters).
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn invite_expiry(issued_at: DateTime<Utc>) -> DateTime<Utc> {
    issued_at + Duration::days(INVITE_TTL_DAYS)
}

impl<R, N> CollaborationService<R, N>
where
    R: CollaborationStore + 'static,
    N: NotificationGateway + 'static,
{
    /// E-mail the collaborator a fresh invite and mark the collaboration `invited`.
    ///
    /// Nothing is persisted unless the gateway accepts the message.
    pub async fn send_invitation(
        &self,
        id: CollaborationId,
        owner: UserId,
    ) -> Result<CollaborationInvite, CollaborationError> {
        let view = self.get(id, owner)?;
        let application = self
            .store
            .application(view.collaboration.application_id, owner)?
            .ok_or(CollaborationError::NotFound("application"))?;
        let student = self.student_contact(owner)?;

        let token = generate_token();
        let issued_at = Utc::now();
        let expires_at = invite_expiry(issued_at);
        let message = templates::invitation(
            &student,
            &view.collaborator,
            &application,
            view.collaboration.collaboration_type,
            &self.invite_link(&token),
            expires_at,
        );

        let message_id =
            send_with_timeout(self.gateway.as_ref(), &message, self.settings.gateway_timeout)
                .await?;

        let invite = self.store.insert_invite(NewInvite {
            collaboration_id: id,
            user_id: owner,
            invite_token: token,
            sent_at: Some(issued_at),
            expires_at,
            delivery_status: DeliveryStatus::Sent,
            external_message_id: Some(message_id),
            created_at: issued_at,
        })?;

        let invited = BaseChanges {
            status: Some(status::INVITED.to_string()),
            awaiting_action_from: Some(Some(awaiting::COLLABORATOR.to_string())),
            ..BaseChanges::default()
        };
        self.store.update_collaboration(id, &invited, issued_at)?;

        self.append_history(
            id,
            status::INVITED,
            Some(format!("Invitation sent to {}", view.collaborator.email)),
            issued_at,
        );
        info!(collaboration_id = %id, invite_id = %invite.id, "invitation sent");

        Ok(invite)
    }

    /// Re-send the most recent invite with a new token and expiry, updating that row in place.
    pub async fn resend_invitation(
        &self,
        id: CollaborationId,
        owner: UserId,
    ) -> Result<CollaborationInvite, CollaborationError> {
        let view = self.get(id, owner)?;
        let mut invite = self
            .store
            .latest_invite(id)?
            .ok_or(CollaborationError::NotFound("invite"))?;

        let now = Utc::now();
        if invite.is_expired(now) {
            return Err(ValidationError::InviteExpired(invite.expires_at).into());
        }

        let application = self
            .store
            .application(view.collaboration.application_id, owner)?
            .ok_or(CollaborationError::NotFound("application"))?;
        let student = self.student_contact(owner)?;

        let token = generate_token();
        let expires_at = invite_expiry(now);
        let message = templates::invitation(
            &student,
            &view.collaborator,
            &application,
            view.collaboration.collaboration_type,
            &self.invite_link(&token),
            expires_at,
        );

        let message_id = match send_with_timeout(
            self.gateway.as_ref(),
            &message,
            self.settings.gateway_timeout,
        )
        .await
        {
            Ok(message_id) => message_id,
            Err(err) => {
                invite.delivery_status = DeliveryStatus::Failed;
                if let Err(store_err) = self.store.update_invite(&invite) {
                    warn!(
                        invite_id = %invite.id,
                        error = %store_err,
                        "failed to record invite delivery failure"
                    );
                }
                return Err(err.into());
            }
        };

        invite.invite_token = token;
        invite.expires_at = expires_at;
        invite.delivery_status = DeliveryStatus::Sent;
        invite.sent_at = Some(now);
        invite.external_message_id = Some(message_id);
        self.store.update_invite(&invite)?;

        self.append_history(
            id,
            "resend",
            Some(format!("Invitation re-sent to {}", view.collaborator.email)),
            now,
        );
        info!(collaboration_id = %id, invite_id = %invite.id, "invitation re-sent");

        Ok(invite)
    }

    /// Queue an invite for later dispatch. The gateway is not contacted; an external job picks
    /// up pending invites.
    pub fn schedule_invitation(
        &self,
        id: CollaborationId,
        owner: UserId,
        scheduled_for: DateTime<Utc>,
    ) -> Result<CollaborationInvite, CollaborationError> {
        self.get(id, owner)?;

        let invite = self.store.insert_invite(NewInvite {
            collaboration_id: id,
            user_id: owner,
            invite_token: generate_token(),
            sent_at: None,
            expires_at: invite_expiry(scheduled_for),
            delivery_status: DeliveryStatus::Pending,
            external_message_id: None,
            created_at: Utc::now(),
        })?;

        self.append_history(
            id,
            "invite_scheduled",
            Some(format!("Invitation scheduled for {}", scheduled_for.to_rfc3339())),
            invite.created_at,
        );

        Ok(invite)
    }

    fn student_contact(&self, owner: UserId) -> Result<StudentContact, CollaborationError> {
        self.store
            .student(owner)?
            .ok_or(CollaborationError::NotFound("student"))
    }
}
