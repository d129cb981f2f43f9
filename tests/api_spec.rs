use speculate2::speculate;

speculate! {
    use std::future::Future;

    use axum::http::StatusCode;
    use axum_test::{TestResponse, TestServer};
    use goalpost::api::{create_router, AppState};
    use goalpost::config::cookie_key;
    use goalpost::models::*;
    use goalpost::db::Database;

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to build runtime")
            .block_on(future)
    }

    fn setup() -> (TestServer, Database) {
        setup_with_secure_cookies(false)
    }

    fn setup_with_secure_cookies(secure: bool) -> (TestServer, Database) {
        let db = Database::open_memory().expect("Failed to create test database");
        let state = AppState::new(db.clone(), cookie_key("test-secret"), secure);
        let server = TestServer::builder()
            .save_cookies()
            .build(create_router(state))
            .expect("Failed to start test server");
        (server, db)
    }

    fn location(response: &TestResponse) -> String {
        response.header("location").to_str().unwrap().to_string()
    }

    fn set_cookie(response: &TestResponse) -> String {
        response.header("set-cookie").to_str().unwrap().to_string()
    }

    fn session_rows(db: &Database) -> i64 {
        db.with_connection(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
        })
        .unwrap()
    }

    async fn register(server: &TestServer, username: &str, password: &str) -> TestResponse {
        server
            .post("/register")
            .form(&[
                ("username", username),
                ("email", "someone@example.com"),
                ("password", password),
            ])
            .await
    }

    async fn login(server: &TestServer, username: &str, password: &str) -> TestResponse {
        server
            .post("/login")
            .form(&[("username", username), ("password", password)])
            .await
    }

    async fn logged_in(server: &TestServer) {
        register(server, "ada", "hunter2").await;
        let response = login(server, "ada", "hunter2").await;
        assert_eq!(location(&response), "/goal");
    }

    async fn create_goal(server: &TestServer, db: &Database, title: &str) -> Goal {
        let response = server
            .post("/goal")
            .form(&[
                ("title", title),
                ("description", "Something worth doing"),
                ("target_date", "end of year"),
            ])
            .await;
        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);

        db.with_connection(|conn| Goal::list_all(conn))
            .unwrap()
            .into_iter()
            .find(|goal| goal.title == title)
            .expect("goal was not stored")
    }

    async fn add_milestone(server: &TestServer, goal: &Goal, description: &str) {
        let response = server
            .post(&format!("/goal/{}/milestone", goal.id))
            .form(&[("description", description), ("due_date", "")])
            .await;
        assert_eq!(location(&response), format!("/goal/{}", goal.id));
    }

    describe "home" {
        it "renders for anonymous visitors" {
            block_on(async {
                let (server, _db) = setup();
                let response = server.get("/").await;
                assert_eq!(response.status_code(), StatusCode::OK);
                assert!(response.text().contains("Goalpost"));
            });
        }

        it "renders the error page for unknown paths" {
            block_on(async {
                let (server, _db) = setup();
                let response = server.get("/no/such/page").await;
                assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
                assert!(response.text().contains("Page not found"));
            });
        }
    }

    describe "registration" {
        it "stores a hashed password and redirects to login" {
            block_on(async {
                let (server, db) = setup();
                let response = register(&server, "ada", "hunter2").await;
                assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
                assert_eq!(location(&response), "/login");

                let page = server.get("/login").await;
                assert!(page.text().contains("Registration successful!"));

                let user = db.with_connection(|conn| User::find_by_username(conn, "ada"))
                    .unwrap()
                    .unwrap();
                assert_ne!(user.password_hash, "hunter2");
            });
        }

        it "redirects a duplicate username back with an error flash" {
            block_on(async {
                let (server, _db) = setup();
                register(&server, "ada", "hunter2").await;
                let response = register(&server, "ada", "other").await;
                assert_eq!(location(&response), "/register");

                let page = server.get("/register").await;
                assert!(page.text().contains("That username is already taken."));
            });
        }

        it "rejects a blank username" {
            block_on(async {
                let (server, db) = setup();
                let response = register(&server, "   ", "hunter2").await;
                assert_eq!(location(&response), "/register");

                let found = db.with_connection(|conn| User::find_by_username(conn, "")).unwrap();
                assert!(found.is_none());
            });
        }

        it "shows a flash message only once" {
            block_on(async {
                let (server, _db) = setup();
                register(&server, "ada", "hunter2").await;

                let first = server.get("/login").await;
                assert!(first.text().contains("Registration successful!"));

                let second = server.get("/login").await;
                assert!(!second.text().contains("Registration successful!"));
            });
        }
    }

    describe "login" {
        it "rejects a wrong password" {
            block_on(async {
                let (server, _db) = setup();
                register(&server, "ada", "hunter2").await;
                let response = login(&server, "ada", "wrong").await;
                assert_eq!(location(&response), "/login");

                let page = server.get("/login").await;
                assert!(page.text().contains("Invalid username or password."));
            });
        }

        it "rejects an unknown user" {
            block_on(async {
                let (server, _db) = setup();
                let response = login(&server, "nobody", "hunter2").await;
                assert_eq!(location(&response), "/login");
            });
        }

        it "lets the user in and welcomes them" {
            block_on(async {
                let (server, _db) = setup();
                logged_in(&server).await;

                let page = server.get("/goal").await;
                assert_eq!(page.status_code(), StatusCode::OK);
                let body = page.text();
                assert!(body.contains("Welcome back!"));
                assert!(body.contains("ada"));
            });
        }

        it "ends the session on logout" {
            block_on(async {
                let (server, _db) = setup();
                logged_in(&server).await;

                let response = server.get("/logout").await;
                assert_eq!(location(&response), "/login");

                let gated = server.get("/goal").await;
                assert_eq!(location(&gated), "/login");
            });
        }
    }

    describe "session cookie" {
        it "is HttpOnly for 24 hours and Secure only in production" {
            block_on(async {
                let (server, _db) = setup();
                let cookie = set_cookie(&server.get("/goal").await);
                assert!(cookie.starts_with("goalpost.sid="));
                assert!(cookie.contains("HttpOnly"));
                assert!(cookie.contains("SameSite=Lax"));
                assert!(cookie.contains("Path=/"));
                assert!(cookie.contains("Max-Age=86400"));
                assert!(!cookie.contains("; Secure"));

                let (server, _db) = setup_with_secure_cookies(true);
                let cookie = set_cookie(&server.get("/goal").await);
                assert!(cookie.contains("; Secure"));
                assert!(cookie.contains("HttpOnly"));
            });
        }

        it "is removed on logout" {
            block_on(async {
                let (server, db) = setup();
                logged_in(&server).await;
                assert_eq!(session_rows(&db), 1);

                let response = server.get("/logout").await;
                let cookie = set_cookie(&response);
                assert!(cookie.starts_with("goalpost.sid="));
                assert!(cookie.contains("Max-Age=0"));
                assert_eq!(session_rows(&db), 0);
            });
        }

        it "purges expired sessions while the server runs" {
            block_on(async {
                let (server, db) = setup();
                server.get("/goal").await;
                assert_eq!(session_rows(&db), 1);

                db.with_connection(|conn| {
                    conn.execute(
                        "UPDATE sessions SET expires_at = '2000-01-01T00:00:00.000000Z'",
                        [],
                    )?;
                    Ok(())
                })
                .unwrap();

                let response = server.get("/goal").await;
                assert_eq!(location(&response), "/login");
                assert_eq!(session_rows(&db), 1);

                let page = server.get("/login").await;
                assert!(page.text().contains("Please log in."));
            });
        }
    }

    describe "access control" {
        it "sends anonymous visitors to the login page" {
            block_on(async {
                let (server, _db) = setup();
                let response = server.get("/goal").await;
                assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
                assert_eq!(location(&response), "/login");

                let page = server.get("/login").await;
                assert!(page.text().contains("Please log in."));
            });
        }

        it "does not create goals for anonymous visitors" {
            block_on(async {
                let (server, db) = setup();
                let response = server
                    .post("/goal")
                    .form(&[("title", "t"), ("description", "d"), ("target_date", "x")])
                    .await;
                assert_eq!(location(&response), "/login");

                let goals = db.with_connection(|conn| Goal::list_all(conn)).unwrap();
                assert!(goals.is_empty());
            });
        }
    }

    describe "goals" {
        it "creates a goal authored by the current user" {
            block_on(async {
                let (server, db) = setup();
                logged_in(&server).await;
                let goal = create_goal(&server, &db, "Run a marathon").await;

                let list = server.get("/goal").await;
                assert!(list.text().contains("Run a marathon"));

                let author = db.with_connection(|conn| User::find_by_username(conn, "ada"))
                    .unwrap()
                    .unwrap();
                assert_eq!(goal.author_id, Some(author.id));
                assert_eq!(goal.target_date, "end of year");
            });
        }

        it "rejects a goal without a title" {
            block_on(async {
                let (server, _db) = setup();
                logged_in(&server).await;
                let response = server
                    .post("/goal")
                    .form(&[("title", " "), ("description", "d"), ("target_date", "x")])
                    .await;
                assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
                assert!(response.text().contains("Title is required"));
            });
        }

        it "escapes user content" {
            block_on(async {
                let (server, db) = setup();
                logged_in(&server).await;
                let goal = create_goal(&server, &db, "<script>alert(1)</script>").await;

                let page = server.get(&format!("/goal/{}", goal.id)).await;
                let body = page.text();
                assert!(!body.contains("<script>alert(1)</script>"));
                assert!(body.contains("&lt;script&gt;"));
            });
        }

        it "returns 404 for unknown and malformed ids" {
            block_on(async {
                let (server, _db) = setup();
                logged_in(&server).await;

                let unknown = server.get(&format!("/goal/{}", uuid::Uuid::new_v4())).await;
                assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);

                let malformed = server.get("/goal/not-an-id").await;
                assert_eq!(malformed.status_code(), StatusCode::NOT_FOUND);
            });
        }

        it "replaces every field through the edit form" {
            block_on(async {
                let (server, db) = setup();
                logged_in(&server).await;
                let goal = create_goal(&server, &db, "Draft").await;

                let edit = server.get(&format!("/goal/{}/edit", goal.id)).await;
                assert!(edit.text().contains("value=\"Draft\""));

                let response = server
                    .post(&format!("/goal/{}?_method=PUT", goal.id))
                    .form(&[
                        ("title", "Final"),
                        ("description", "Rewritten"),
                        ("target_date", "spring"),
                    ])
                    .await;
                assert_eq!(location(&response), format!("/goal/{}", goal.id));

                let updated = db.with_connection(|conn| Goal::find_by_id(conn, &goal.id))
                    .unwrap()
                    .unwrap();
                assert_eq!(updated.title, "Final");
                assert_eq!(updated.description, "Rewritten");
                assert_eq!(updated.target_date, "spring");
            });
        }

        it "accepts PUT on the edit path" {
            block_on(async {
                let (server, db) = setup();
                logged_in(&server).await;
                let goal = create_goal(&server, &db, "Draft").await;

                let response = server
                    .put(&format!("/goal/{}/edit", goal.id))
                    .form(&[("title", "Edited"), ("description", "d"), ("target_date", "x")])
                    .await;
                assert_eq!(response.status_code(), StatusCode::SEE_OTHER);

                let updated = db.with_connection(|conn| Goal::find_by_id(conn, &goal.id))
                    .unwrap()
                    .unwrap();
                assert_eq!(updated.title, "Edited");
            });
        }

        it "deletes a goal and its milestones through a form override" {
            block_on(async {
                let (server, db) = setup();
                logged_in(&server).await;
                let goal = create_goal(&server, &db, "Short lived").await;
                add_milestone(&server, &goal, "First step").await;

                let response = server.post(&format!("/goal/{}?_method=DELETE", goal.id)).await;
                assert_eq!(location(&response), "/goal");

                let gone = server.get(&format!("/goal/{}", goal.id)).await;
                assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);

                let milestones = db.with_connection(|conn| Milestone::list_by_goal(conn, &goal.id))
                    .unwrap();
                assert!(milestones.is_empty());
            });
        }
    }

    describe "milestones" {
        it "appends milestones in order and shows them on the goal" {
            block_on(async {
                let (server, db) = setup();
                logged_in(&server).await;
                let goal = create_goal(&server, &db, "Learn Rust").await;
                add_milestone(&server, &goal, "Read the book").await;
                add_milestone(&server, &goal, "Write a crate").await;

                let page = server.get(&format!("/goal/{}", goal.id)).await;
                let body = page.text();
                let first = body.find("Read the book").expect("first milestone missing");
                let second = body.find("Write a crate").expect("second milestone missing");
                assert!(first < second);
            });
        }

        it "removes the milestone id from the parent goal on delete" {
            block_on(async {
                let (server, db) = setup();
                logged_in(&server).await;
                let goal = create_goal(&server, &db, "Learn Rust").await;
                add_milestone(&server, &goal, "Keep me").await;
                add_milestone(&server, &goal, "Remove me").await;

                let milestones = db.with_connection(|conn| Milestone::list_by_goal(conn, &goal.id))
                    .unwrap();
                let kept = milestones[0].id;
                let removed = milestones[1].id;

                let response = server
                    .post(&format!("/goal/{}/milestone/{}?_method=DELETE", goal.id, removed))
                    .await;
                assert_eq!(location(&response), format!("/goal/{}", goal.id));

                let reloaded = db.with_connection(|conn| Goal::find_by_id(conn, &goal.id))
                    .unwrap()
                    .unwrap();
                assert_eq!(reloaded.milestone_ids, vec![kept]);

                let deleted = db.with_connection(|conn| Milestone::find_by_id(conn, &removed)).unwrap();
                assert!(deleted.is_none());
            });
        }

        it "returns 404 when the milestone belongs elsewhere" {
            block_on(async {
                let (server, db) = setup();
                logged_in(&server).await;
                let owner = create_goal(&server, &db, "Owner").await;
                let other = create_goal(&server, &db, "Other").await;
                add_milestone(&server, &owner, "Mine").await;

                let milestone = db.with_connection(|conn| Milestone::list_by_goal(conn, &owner.id))
                    .unwrap()
                    .remove(0);

                let response = server
                    .delete(&format!("/goal/{}/milestone/{}", other.id, milestone.id))
                    .await;
                assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
            });
        }

        it "rejects a milestone without a description" {
            block_on(async {
                let (server, db) = setup();
                logged_in(&server).await;
                let goal = create_goal(&server, &db, "Learn Rust").await;

                let response = server
                    .post(&format!("/goal/{}/milestone", goal.id))
                    .form(&[("description", ""), ("due_date", "soon")])
                    .await;
                assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
            });
        }
    }
}
