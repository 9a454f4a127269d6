use actix_web::http::header::LOCATION;
use actix_web::{Error, HttpResponse};
use paperclip::actix::{api_v2_operation, web};

use booktech_common::clock::now_millis;

use crate::api::{
    Caller, NewTicket, NotificationsOverview, TicketId, TicketMessage, TicketReply,
    TicketStatusUpdate, UserId,
};
use crate::handlers::{Store, UserNotificationPath};
use crate::service_error::ServiceError;

#[api_v2_operation]
pub async fn create_ticket(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
    ticket: web::Json<NewTicket>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if caller.user_id != user_id {
        return Ok(HttpResponse::Forbidden().finish());
    }
    let ticket = ticket.into_inner();
    if ticket.subject.trim().is_empty() || ticket.message.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json("Subject and message are required"));
    }

    Ok(
        match store
            .repository
            .create_ticket(user_id, caller.role, ticket)
            .await
        {
            Ok(ticket) => {
                tracing::info!("User {} opened ticket {}", user_id, ticket.ticket_id);
                HttpResponse::Created()
                    .append_header((LOCATION, format!("/api/ticket/{}", ticket.ticket_id)))
                    .json(ticket)
            }
            Err(err) => ServiceError::from(err).into_response("Create ticket"),
        },
    )
}

#[api_v2_operation]
pub async fn get_user_tickets(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(match store.repository.list_tickets(Some(user_id)).await {
        Ok(tickets) => HttpResponse::Ok().json(tickets),
        Err(err) => ServiceError::from(err).into_response("Get user tickets"),
    })
}

#[api_v2_operation]
pub async fn get_all_tickets(store: Store, caller: Caller) -> Result<HttpResponse, Error> {
    if !caller.is_admin() {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(match store.repository.list_tickets(None).await {
        Ok(tickets) => HttpResponse::Ok().json(tickets),
        Err(err) => ServiceError::from(err).into_response("Get tickets"),
    })
}

#[api_v2_operation]
pub async fn get_ticket(
    store: Store,
    caller: Caller,
    ticket_id: web::Path<TicketId>,
) -> Result<HttpResponse, Error> {
    Ok(match store.repository.get_ticket(ticket_id.into_inner()).await {
        Ok(ticket) if caller.can_act_for(ticket.user_id) => HttpResponse::Ok().json(ticket),
        Ok(_) => HttpResponse::Forbidden().finish(),
        Err(err) => ServiceError::from(err).into_response("Get ticket"),
    })
}

#[api_v2_operation]
pub async fn reply_to_ticket(
    store: Store,
    caller: Caller,
    ticket_id: web::Path<TicketId>,
    reply: web::Json<TicketReply>,
) -> Result<HttpResponse, Error> {
    let ticket_id = ticket_id.into_inner();
    let body = reply.into_inner().body;
    if body.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json("Message body is required"));
    }
    let owner = match store.repository.get_ticket(ticket_id).await {
        Ok(ticket) if caller.can_act_for(ticket.user_id) => ticket.user_id,
        Ok(_) => return Ok(HttpResponse::Forbidden().finish()),
        Err(err) => return Ok(ServiceError::from(err).into_response("Reply to ticket")),
    };

    let message = TicketMessage {
        author_id: caller.user_id,
        author_role: caller.role,
        body,
        sent_at: now_millis(),
    };
    let ticket = match store.repository.add_ticket_message(ticket_id, message).await {
        Ok(ticket) => ticket,
        Err(err) => return Ok(ServiceError::from(err).into_response("Reply to ticket")),
    };
    if caller.is_admin() && caller.user_id != owner {
        store
            .notify(
                owner,
                "Support reply",
                &format!("Support answered your ticket \"{}\"", ticket.subject),
            )
            .await;
    }
    Ok(HttpResponse::Ok().json(ticket))
}

#[api_v2_operation]
pub async fn update_ticket_status(
    store: Store,
    caller: Caller,
    ticket_id: web::Path<TicketId>,
    update: web::Json<TicketStatusUpdate>,
) -> Result<HttpResponse, Error> {
    if !caller.is_admin() {
        return Ok(HttpResponse::Forbidden().finish());
    }
    let ticket_id = ticket_id.into_inner();
    let status = update.status;
    Ok(
        match store.repository.set_ticket_status(ticket_id, status).await {
            Ok(ticket) => {
                store
                    .notify(
                        ticket.user_id,
                        "Ticket update",
                        &format!("Your ticket \"{}\" is now {}", ticket.subject, status.as_str()),
                    )
                    .await;
                HttpResponse::Ok().json(ticket)
            }
            Err(err) => ServiceError::from(err).into_response("Update ticket status"),
        },
    )
}

#[api_v2_operation]
pub async fn get_notifications(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(match store.repository.list_notifications(user_id).await {
        Ok(notifications) => HttpResponse::Ok().json(NotificationsOverview::new(notifications)),
        Err(err) => ServiceError::from(err).into_response("Get notifications"),
    })
}

#[api_v2_operation]
pub async fn mark_all_notifications_read(
    store: Store,
    caller: Caller,
    user_id: web::Path<UserId>,
) -> Result<HttpResponse, Error> {
    let user_id = user_id.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(
        match store.repository.mark_all_notifications_read(user_id).await {
            Ok(marked) => HttpResponse::Ok().json(marked),
            Err(err) => ServiceError::from(err).into_response("Mark notifications read"),
        },
    )
}

#[api_v2_operation]
pub async fn mark_notification_read(
    store: Store,
    caller: Caller,
    path: web::Path<UserNotificationPath>,
) -> Result<HttpResponse, Error> {
    let UserNotificationPath {
        user_id,
        notification_id,
    } = path.into_inner();
    if !caller.can_act_for(user_id) {
        return Ok(HttpResponse::Forbidden().finish());
    }
    Ok(
        match store
            .repository
            .mark_notification_read(user_id, notification_id)
            .await
        {
            Ok(()) => HttpResponse::Ok().finish(),
            Err(err) => ServiceError::from(err).into_response("Mark notification read"),
        },
    )
}
