pub mod mock_controller;
